//! Tunnel lifecycle control
//!
//! The controller owns the single tunnel identity and the canonical stage,
//! serializes connect/disconnect/status commands, and emits one event per
//! stage transition to the registered sink. Disconnect goes through the
//! reconciler, which escalates through teardown strategies until the OS
//! probe confirms no VPN transport is active.

pub mod lifecycle;
pub mod reconciler;
pub mod stage;

pub use lifecycle::{LifecycleController, StageSink};
pub use stage::TunnelStage;
