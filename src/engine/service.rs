use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{WgCtlError, WgCtlResult};

/// Last-resort teardown: stop the VPN service unit directly, bypassing the
/// engine's tunnel abstraction
#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn stop_unit(&self, unit: &str) -> WgCtlResult<()>;
}

/// systemd implementation shelling out to systemctl
pub struct SystemdControl;

#[async_trait]
impl ServiceControl for SystemdControl {
    async fn stop_unit(&self, unit: &str) -> WgCtlResult<()> {
        info!("Stopping service unit: {}", unit);

        let output = Command::new("systemctl")
            .args(["stop", unit])
            .output()
            .await
            .map_err(|e| WgCtlError::ServiceError(format!("Failed to run systemctl: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            warn!("systemctl stop {} failed: {}", unit, stderr);
            return Err(WgCtlError::CommandFailed {
                cmd: format!("systemctl stop {}", unit),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(())
    }
}
