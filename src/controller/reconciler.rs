use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{CtlConfig, SettleDelays};
use crate::engine::{DesiredState, ServiceControl, TunnelConfig, TunnelEngine, TunnelHandle, VpnProbe};
use crate::error::{WgCtlError, WgCtlResult};
use super::lifecycle::StageTracker;
use super::stage::TunnelStage;

/// Teardown strategies, applied in order until the OS probe reports no
/// active VPN. Escalation, not retry: each strategy is a one-shot action
/// followed by a fixed settle delay and a fresh probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// set-state DOWN for every tunnel the engine reports as running
    KnownTunnels,
    /// Bring up a throwaway config on our own identity to take ownership
    /// of whatever interface is active, then tear it down
    Takeover,
    /// set-state DOWN against the conventional fixed name
    FallbackName,
    /// Stop the VPN service unit, bypassing the engine entirely
    ServiceKill,
}

const LADDER: [Strategy; 4] = [
    Strategy::KnownTunnels,
    Strategy::Takeover,
    Strategy::FallbackName,
    Strategy::ServiceKill,
];

/// Drives disconnect until the OS probe confirms no VPN is active
pub(crate) struct Reconciler {
    engine: Arc<dyn TunnelEngine>,
    probe: Arc<dyn VpnProbe>,
    services: Arc<dyn ServiceControl>,
    tracker: Arc<StageTracker>,
    settle: SettleDelays,
    fallback_tunnel: String,
    service_unit: String,
}

impl Reconciler {
    pub(crate) fn new(
        engine: Arc<dyn TunnelEngine>,
        probe: Arc<dyn VpnProbe>,
        services: Arc<dyn ServiceControl>,
        tracker: Arc<StageTracker>,
        config: &CtlConfig,
    ) -> Self {
        Self {
            engine,
            probe,
            services,
            tracker,
            settle: config.settle.clone(),
            fallback_tunnel: config.fallback_tunnel.clone(),
            service_unit: config.service_unit.clone(),
        }
    }

    /// Run the ladder. Returns Ok once the probe reports inactive;
    /// VpnStillRunning after all strategies are exhausted. Per-strategy
    /// failures are logged and swallowed.
    pub(crate) async fn run(&self, identity: Option<&str>) -> WgCtlResult<()> {
        let running = match self.engine.running_tunnels().await {
            Ok(running) => running,
            Err(e) => {
                warn!("Engine could not list running tunnels: {}", e);
                Vec::new()
            }
        };
        let mut active = self.probe.vpn_active().await;
        info!("Disconnect - running tunnels: {:?}, vpn active: {}", running, active);

        // Idempotent no-op disconnect
        if running.is_empty() && !active {
            info!("Disconnect - VPN already off");
            return Ok(());
        }

        self.tracker.set(TunnelStage::Disconnecting).await;

        for strategy in LADDER {
            // Known tunnels are torn down whenever the engine lists any,
            // so its bookkeeping never outlives a disconnect; only the
            // escalation strategies are gated on the OS probe
            if !active && strategy != Strategy::KnownTunnels {
                break;
            }
            let settle = match self.apply(strategy, identity, &running).await {
                Some(settle) => settle,
                // Strategy took no action, so there is nothing to wait for
                None => continue,
            };
            sleep(settle).await;
            active = self.probe.vpn_active().await;
            if !active {
                info!("Disconnect - {:?} cleared the VPN", strategy);
            }
        }

        if active {
            warn!("Disconnect - ladder exhausted, VPN still running");
            Err(WgCtlError::VpnStillRunning)
        } else {
            Ok(())
        }
    }

    /// Apply one strategy; returns the settle delay to wait before
    /// re-probing, or None when the strategy was not applicable
    async fn apply(
        &self,
        strategy: Strategy,
        identity: Option<&str>,
        running: &[String],
    ) -> Option<Duration> {
        match strategy {
            Strategy::KnownTunnels => {
                if running.is_empty() {
                    return None;
                }
                for name in running {
                    info!("Disconnect - stopping tunnel: {}", name);
                    let handle = TunnelHandle::new(name.as_str());
                    if let Err(e) = self.engine.set_state(&handle, DesiredState::Down, None).await {
                        warn!("Teardown of {} failed: {}", name, e);
                    }
                }
                Some(self.settle.teardown())
            }
            Strategy::Takeover => {
                let name = identity.unwrap_or(&self.fallback_tunnel);
                let handle = TunnelHandle::new(name);
                let throwaway = TunnelConfig::throwaway();

                info!("Disconnect - taking over VPN with throwaway config on {}", name);
                match self
                    .engine
                    .set_state(&handle, DesiredState::Up, Some(&throwaway))
                    .await
                {
                    Ok(()) => {
                        sleep(self.settle.takeover()).await;
                        if let Err(e) = self.engine.set_state(&handle, DesiredState::Down, None).await
                        {
                            warn!("Takeover teardown failed: {}", e);
                        }
                    }
                    Err(e) => warn!("Takeover failed: {}", e),
                }
                Some(self.settle.teardown())
            }
            Strategy::FallbackName => {
                info!("Disconnect - trying fixed name: {}", self.fallback_tunnel);
                let handle = TunnelHandle::new(self.fallback_tunnel.as_str());
                if let Err(e) = self.engine.set_state(&handle, DesiredState::Down, None).await {
                    warn!("Fixed-name teardown failed: {}", e);
                }
                Some(self.settle.teardown())
            }
            Strategy::ServiceKill => {
                info!("Disconnect - stopping service unit: {}", self.service_unit);
                if let Err(e) = self.services.stop_unit(&self.service_unit).await {
                    warn!("Service stop failed: {}", e);
                }
                Some(self.settle.takeover())
            }
        }
    }
}
