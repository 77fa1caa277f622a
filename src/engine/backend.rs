use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::WgCtlResult;
use super::config::TunnelConfig;

/// State requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Up,
    Down,
}

/// State reported back by the engine's asynchronous callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Up,
    Down,
    /// The engine is between states (interface created but handshake pending)
    Transitioning,
}

/// Cumulative traffic counters for a tunnel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub last_handshake: Option<std::time::SystemTime>,
    pub peer_endpoint: Option<String>,
}

/// Handle identifying a tunnel in engine calls
///
/// Carries an optional channel the engine notifies on asynchronous state
/// changes. Handles without a channel (the reconciler's throwaway handles)
/// only log transitions.
#[derive(Debug, Clone)]
pub struct TunnelHandle {
    name: String,
    events: Option<mpsc::UnboundedSender<EngineState>>,
}

impl TunnelHandle {
    /// Handle that only logs state changes
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), events: None }
    }

    /// Handle that forwards state changes into `events`
    pub fn with_events(name: impl Into<String>, events: mpsc::UnboundedSender<EngineState>) -> Self {
        Self { name: name.into(), events: Some(events) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver an engine state change to the subscriber, if any
    pub fn notify(&self, state: EngineState) {
        debug!("Tunnel {} state: {:?}", self.name, state);
        if let Some(events) = &self.events {
            // Receiver gone means the controller was dropped; nothing to do
            let _ = events.send(state);
        }
    }
}

/// Contract for the external tunnel backend
///
/// The engine performs all cryptographic tunnel establishment and data-plane
/// work; the controller only drives desired state through this interface.
#[async_trait]
pub trait TunnelEngine: Send + Sync {
    /// Drive the named tunnel to the desired state. `config` is required for
    /// `Up` and ignored for `Down`. Asynchronous transitions are reported
    /// through the handle.
    async fn set_state(
        &self,
        tunnel: &TunnelHandle,
        state: DesiredState,
        config: Option<&TunnelConfig>,
    ) -> WgCtlResult<()>;

    /// Names of tunnels the engine currently believes are running
    async fn running_tunnels(&self) -> WgCtlResult<Vec<String>>;

    /// Cumulative traffic counters for a tunnel the engine knows about
    async fn statistics(&self, tunnel: &str) -> WgCtlResult<TrafficStats>;
}
