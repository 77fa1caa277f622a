//! wgctl - WireGuard Tunnel Lifecycle Controller
//!
//! Bridge between an application shell and a WireGuard tunnel engine:
//! - Command surface: initialize, start, stop, stage, checkPermission,
//!   traffic counters
//! - Single canonical tunnel stage with exactly-once event propagation
//! - State reconciliation against OS truth, with an escalating teardown
//!   ladder for tunnels the engine has lost track of
//! - Linux adapters: wg-quick engine, /sys/class/net VPN probe, systemd
//!   service control
//!
//! The engine performs all cryptographic tunnel work; this crate only
//! drives desired state and reports transitions.

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod permission;
pub mod validation;

// Re-export commonly used types
pub use config::{CtlConfig, SettleDelays};
pub use controller::{LifecycleController, StageSink, TunnelStage};
pub use dispatch::CommandDispatcher;
pub use engine::{
    DesiredState, EngineState, ServiceControl, SystemVpnProbe, SystemdControl, TrafficStats,
    TunnelConfig, TunnelEngine, TunnelHandle, VpnProbe, WgQuickEngine,
};
pub use error::{WgCtlError, WgCtlResult};
pub use permission::{EuidBroker, PermissionBroker};
