use std::fmt;

use crate::engine::EngineState;

/// Canonical tunnel lifecycle stage
///
/// Single-writer: only the controller's update path mutates it. The wire
/// strings are the values emitted to the event sink and returned by the
/// `stage` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelStage {
    NoConnection,
    Preparing,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    WaitConnection,
}

impl TunnelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelStage::NoConnection => "no_connection",
            TunnelStage::Preparing => "prepare",
            TunnelStage::Connecting => "connecting",
            TunnelStage::Connected => "connected",
            TunnelStage::Disconnecting => "disconnecting",
            TunnelStage::Disconnected => "disconnected",
            TunnelStage::WaitConnection => "wait_connection",
        }
    }

    /// Map an engine state callback onto the canonical stage
    pub fn from_engine(state: EngineState) -> Self {
        match state {
            EngineState::Up => TunnelStage::Connected,
            EngineState::Down => TunnelStage::Disconnected,
            EngineState::Transitioning => TunnelStage::WaitConnection,
        }
    }
}

impl fmt::Display for TunnelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings() {
        assert_eq!(TunnelStage::NoConnection.as_str(), "no_connection");
        assert_eq!(TunnelStage::Preparing.as_str(), "prepare");
        assert_eq!(TunnelStage::Connecting.as_str(), "connecting");
        assert_eq!(TunnelStage::Connected.as_str(), "connected");
        assert_eq!(TunnelStage::Disconnecting.as_str(), "disconnecting");
        assert_eq!(TunnelStage::Disconnected.as_str(), "disconnected");
        assert_eq!(TunnelStage::WaitConnection.as_str(), "wait_connection");
    }

    #[test]
    fn test_engine_state_mapping() {
        assert_eq!(TunnelStage::from_engine(EngineState::Up), TunnelStage::Connected);
        assert_eq!(TunnelStage::from_engine(EngineState::Down), TunnelStage::Disconnected);
        assert_eq!(
            TunnelStage::from_engine(EngineState::Transitioning),
            TunnelStage::WaitConnection
        );
    }
}
