//! Error types for wgctl

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum WgCtlError {
    /// IO error
    Io(io::Error),
    /// Command execution failed
    CommandFailed { cmd: String, code: Option<i32>, stderr: String },
    /// Invalid parameter
    InvalidParameter(String),
    /// Tunnel name rejected by the engine naming rule
    InvalidName(String),
    /// OS VPN capability not granted
    PermissionDenied(String),
    /// Malformed wg-quick configuration text
    ConfigParse(String),
    /// The tunnel engine rejected a state transition
    Engine { reason: String },
    /// Teardown ladder exhausted with the OS still reporting an active VPN
    VpnStillRunning,
    /// Traffic counters requested for an unknown or inactive tunnel
    Stats(String),
    /// Controller used before initialize()
    NotInitialized,
    /// Invalid state
    InvalidState(String),
    /// Another connect/disconnect is in flight
    Busy,
    /// Service error (wg-quick, systemctl)
    ServiceError(String),
    /// Unknown command method
    UnknownMethod(String),
}

impl WgCtlError {
    /// Reason code reported over the command surface, matching the codes
    /// the application shell expects on the error channel.
    pub fn code(&self) -> String {
        match self {
            WgCtlError::Io(_) => "IO_ERROR".to_string(),
            WgCtlError::CommandFailed { .. } => "COMMAND_FAILED".to_string(),
            WgCtlError::InvalidParameter(_) => "INVALID_PARAMETER".to_string(),
            WgCtlError::InvalidName(_) => "Invalid Name".to_string(),
            WgCtlError::PermissionDenied(_) => "PERMISSION_DENIED".to_string(),
            WgCtlError::ConfigParse(_) => "CONFIG_PARSE".to_string(),
            WgCtlError::Engine { reason } => reason.clone(),
            WgCtlError::VpnStillRunning => "VPN_STILL_RUNNING".to_string(),
            WgCtlError::Stats(msg) => msg.clone(),
            WgCtlError::NotInitialized => "NOT_INITIALIZED".to_string(),
            WgCtlError::InvalidState(_) => "INVALID_STATE".to_string(),
            WgCtlError::Busy => "BUSY".to_string(),
            WgCtlError::ServiceError(_) => "SERVICE_ERROR".to_string(),
            WgCtlError::UnknownMethod(_) => "NOT_IMPLEMENTED".to_string(),
        }
    }
}

impl fmt::Display for WgCtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WgCtlError::Io(e) => write!(f, "IO error: {}", e),
            WgCtlError::CommandFailed { cmd, code, stderr } => {
                if let Some(code) = code {
                    write!(f, "Command '{}' failed with code {}: {}", cmd, code, stderr)
                } else {
                    write!(f, "Command '{}' failed: {}", cmd, stderr)
                }
            }
            WgCtlError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            WgCtlError::InvalidName(name) => write!(f, "Invalid tunnel name: {}", name),
            WgCtlError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            WgCtlError::ConfigParse(msg) => write!(f, "Config parse error: {}", msg),
            WgCtlError::Engine { reason } => write!(f, "Engine error: {}", reason),
            WgCtlError::VpnStillRunning => write!(f, "VPN still running after teardown"),
            WgCtlError::Stats(msg) => write!(f, "Stats error: {}", msg),
            WgCtlError::NotInitialized => write!(f, "Tunnel not initialized"),
            WgCtlError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            WgCtlError::Busy => write!(f, "Another operation is in flight"),
            WgCtlError::ServiceError(msg) => write!(f, "Service error: {}", msg),
            WgCtlError::UnknownMethod(name) => write!(f, "Unknown method: {}", name),
        }
    }
}

impl std::error::Error for WgCtlError {}

impl From<io::Error> for WgCtlError {
    fn from(error: io::Error) -> Self {
        WgCtlError::Io(error)
    }
}

pub type WgCtlResult<T> = Result<T, WgCtlError>;
