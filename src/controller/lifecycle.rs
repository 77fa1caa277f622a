use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::CtlConfig;
use crate::engine::{
    DesiredState, EngineState, ServiceControl, TrafficStats, TunnelConfig, TunnelEngine,
    TunnelHandle, VpnProbe,
};
use crate::error::{WgCtlError, WgCtlResult};
use crate::permission::PermissionBroker;
use crate::validation;
use super::reconciler::Reconciler;
use super::stage::TunnelStage;

/// Sink receiving stage wire strings, one per canonical-state change
pub type StageSink = mpsc::UnboundedSender<String>;

/// Canonical stage slot plus the single event sink
///
/// This is the only place the stage is written; controller operations and
/// the engine callback pump both go through `set`, so writes are ordered
/// and last-write-wins. Holding the write lock across the emission makes
/// sink replacement atomic with respect to in-flight emissions.
pub(crate) struct StageTracker {
    inner: RwLock<StageSlot>,
}

struct StageSlot {
    current: TunnelStage,
    sink: Option<StageSink>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            inner: RwLock::new(StageSlot {
                current: TunnelStage::NoConnection,
                sink: None,
            }),
        }
    }

    pub(crate) async fn set(&self, stage: TunnelStage) {
        let mut slot = self.inner.write().await;
        debug!("Stage: {} -> {}", slot.current, stage);
        slot.current = stage;
        if let Some(sink) = &slot.sink {
            // A closed receiver is a cancelled subscription
            if sink.send(stage.as_str().to_string()).is_err() {
                slot.sink = None;
            }
        }
    }

    async fn current(&self) -> TunnelStage {
        self.inner.read().await.current
    }

    async fn replace_sink(&self, sink: Option<StageSink>) {
        self.inner.write().await.sink = sink;
    }
}

/// Owns the single tunnel identity, serializes commands against it, and
/// emits state-change events
///
/// Must be constructed inside a tokio runtime: construction spawns the
/// engine-callback pump task.
pub struct LifecycleController {
    engine: Arc<dyn TunnelEngine>,
    probe: Arc<dyn VpnProbe>,
    broker: Arc<dyn PermissionBroker>,
    reconciler: Reconciler,
    tracker: Arc<StageTracker>,
    /// Tunnel name, set once by initialize and kept across disconnects
    identity: RwLock<Option<String>>,
    /// Handle for the tunnel a connect has been issued for
    live: Mutex<Option<TunnelHandle>>,
    permission: Arc<AtomicBool>,
    /// All engine state callbacks funnel through this channel into the
    /// pump task, so they never race the reconciler on the stage slot
    engine_events: mpsc::UnboundedSender<EngineState>,
    /// Serializes connect/disconnect; an overlapping call is rejected
    op_lock: Mutex<()>,
    /// One-shot OS-truth resync, re-armed on sink (re)subscription
    os_checked: AtomicBool,
}

impl LifecycleController {
    pub fn new(
        engine: Arc<dyn TunnelEngine>,
        probe: Arc<dyn VpnProbe>,
        services: Arc<dyn ServiceControl>,
        broker: Arc<dyn PermissionBroker>,
        config: CtlConfig,
    ) -> Self {
        let tracker = Arc::new(StageTracker::new());

        let (engine_events, mut engine_rx) = mpsc::unbounded_channel();
        let pump_tracker = tracker.clone();
        tokio::spawn(async move {
            while let Some(state) = engine_rx.recv().await {
                pump_tracker.set(TunnelStage::from_engine(state)).await;
            }
        });

        let reconciler = Reconciler::new(
            engine.clone(),
            probe.clone(),
            services,
            tracker.clone(),
            &config,
        );

        Self {
            engine,
            probe,
            broker,
            reconciler,
            tracker,
            identity: RwLock::new(None),
            live: Mutex::new(None),
            permission: Arc::new(AtomicBool::new(false)),
            engine_events,
            op_lock: Mutex::new(()),
            os_checked: AtomicBool::new(false),
        }
    }

    /// Validate and store the tunnel identity, then kick off the
    /// permission flow
    pub async fn initialize(&self, name: &str) -> WgCtlResult<()> {
        validation::validate_tunnel_name(name)?;

        if self.live.lock().await.is_some() {
            return Err(WgCtlError::InvalidState(
                "cannot change tunnel identity while a connect is live".to_string(),
            ));
        }

        info!("Initialized tunnel identity: {}", name);
        *self.identity.write().await = Some(name.to_string());
        self.check_permission();
        Ok(())
    }

    /// Trigger the platform permission flow; the grant is recorded
    /// asynchronously when the broker resolves
    pub fn check_permission(&self) {
        let broker = self.broker.clone();
        let permission = self.permission.clone();
        tokio::spawn(async move {
            let granted = broker.request().await;
            permission.store(granted, Ordering::SeqCst);
            info!("Permission flow resolved: granted={}", granted);
        });
    }

    /// Parse the config text and drive the engine up
    ///
    /// Connected/Disconnected/WaitConnection afterwards come only from the
    /// engine's state callback; this method never synthesizes them.
    pub async fn connect(&self, config_text: &str) -> WgCtlResult<()> {
        let _op = self.op_lock.try_lock().map_err(|_| WgCtlError::Busy)?;

        self.resync_os_truth().await;

        if !self.permission.load(Ordering::SeqCst) {
            self.check_permission();
            return Err(WgCtlError::PermissionDenied(
                "VPN permission not granted".to_string(),
            ));
        }

        let name = self
            .identity
            .read()
            .await
            .clone()
            .ok_or(WgCtlError::NotInitialized)?;

        // Drop any stale handle before a fresh attempt
        self.live.lock().await.take();

        self.tracker.set(TunnelStage::Preparing).await;
        let config = TunnelConfig::parse(config_text)?;
        self.tracker.set(TunnelStage::Connecting).await;

        let handle = TunnelHandle::with_events(name.as_str(), self.engine_events.clone());
        self.engine
            .set_state(&handle, DesiredState::Up, Some(&config))
            .await
            .map_err(|e| match e {
                err @ WgCtlError::Engine { .. } => err,
                other => WgCtlError::Engine { reason: other.to_string() },
            })?;

        *self.live.lock().await = Some(handle);
        info!("Connect issued for tunnel: {}", name);
        Ok(())
    }

    /// Run the teardown ladder; canonical stage always ends Disconnected,
    /// even when the ladder is exhausted
    pub async fn disconnect(&self) -> WgCtlResult<()> {
        let _op = self.op_lock.try_lock().map_err(|_| WgCtlError::Busy)?;

        let identity = self.identity.read().await.clone();
        let outcome = self.reconciler.run(identity.as_deref()).await;

        // The identity name persists; only the live linkage is cleared
        self.live.lock().await.take();
        self.tracker.set(TunnelStage::Disconnected).await;

        if let Err(e) = &outcome {
            warn!("Disconnect finished with error: {}", e);
        }
        outcome
    }

    /// Pure read of the canonical stage
    pub async fn status(&self) -> TunnelStage {
        self.tracker.current().await
    }

    /// Traffic counters for the named tunnel
    pub async fn traffic(&self) -> WgCtlResult<TrafficStats> {
        let name = self
            .identity
            .read()
            .await
            .clone()
            .ok_or_else(|| WgCtlError::Stats("tunnel not initialized".to_string()))?;

        self.engine.statistics(&name).await.map_err(|e| match e {
            err @ WgCtlError::Stats(_) => err,
            other => WgCtlError::Stats(other.to_string()),
        })
    }

    /// Replace the event sink; at most one is live at a time
    pub async fn on_listen(&self, sink: StageSink) {
        self.os_checked.store(false, Ordering::SeqCst);
        self.tracker.replace_sink(Some(sink)).await;
    }

    /// Clear the event sink; transitions while none is registered are
    /// discarded
    pub async fn on_cancel(&self) {
        self.os_checked.store(false, Ordering::SeqCst);
        self.tracker.replace_sink(None).await;
    }

    /// One-shot correction of the believed stage against OS truth, run on
    /// the first connect after a (re)subscription. Tunnels can be started
    /// or stopped outside this controller's knowledge.
    async fn resync_os_truth(&self) {
        if self.os_checked.swap(true, Ordering::SeqCst) {
            return;
        }
        let stage = if self.probe.vpn_active().await {
            TunnelStage::Connected
        } else {
            TunnelStage::Disconnected
        };
        debug!("OS truth resync: {}", stage);
        self.tracker.set(stage).await;
    }
}
