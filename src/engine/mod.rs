//! Tunnel engine abstraction
//!
//! The engine owns the actual encrypted tunnel; this module only defines the
//! contract the lifecycle controller drives, plus the Linux adapters:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Lifecycle Controller / Reconciler │
//! └──────┬─────────────┬───────────┬────┘
//!        │             │           │
//!        ▼             ▼           ▼
//!  TunnelEngine     VpnProbe   ServiceControl   <- contracts
//!  (wg-quick)    (/sys/class/net) (systemctl)   <- Linux adapters
//! ```
//!
//! The probe deliberately does not consult the engine: OS-level VPN state
//! can exist without the engine knowing about it (orphaned from a prior
//! process), and that independence is what makes reconciliation meaningful.

pub mod backend;
pub mod config;
pub mod probe;
pub mod service;
pub mod wgquick;

pub use backend::{DesiredState, EngineState, TrafficStats, TunnelEngine, TunnelHandle};
pub use config::TunnelConfig;
pub use probe::{SystemVpnProbe, VpnProbe};
pub use service::{ServiceControl, SystemdControl};
pub use wgquick::WgQuickEngine;
