use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{WgCtlError, WgCtlResult};
use super::backend::{DesiredState, EngineState, TrafficStats, TunnelEngine, TunnelHandle};
use super::config::TunnelConfig;

/// Tunnel engine backed by the wg-quick and wg command line tools
pub struct WgQuickEngine {
    config_dir: PathBuf,
    /// Config files written for tunnels this engine brought up
    config_paths: Mutex<HashMap<String, PathBuf>>,
}

impl WgQuickEngine {
    /// Engine writing tunnel configs under the system temp directory
    pub fn new() -> Self {
        Self::with_config_dir(std::env::temp_dir())
    }

    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            config_paths: Mutex::new(HashMap::new()),
        }
    }

    /// Check that wg and wg-quick are installed
    pub async fn is_available() -> bool {
        check_binary_available("wg").await && check_binary_available("wg-quick").await
    }

    async fn bring_up(&self, tunnel: &TunnelHandle, config: &TunnelConfig) -> WgCtlResult<()> {
        info!("Bringing up tunnel: {}", tunnel.name());
        tunnel.notify(EngineState::Transitioning);

        let config_path = self.config_dir.join(format!("{}.conf", tunnel.name()));
        write_secure_config(&config_path, &config.render(), 0o600).await?;

        let config_path_str = config_path.to_str().ok_or_else(|| {
            WgCtlError::InvalidParameter("Config path contains invalid UTF-8".to_string())
        })?;
        let output = Command::new("wg-quick")
            .args(["up", config_path_str])
            .output()
            .await
            .map_err(|e| WgCtlError::ServiceError(format!("Failed to start wg-quick: {}", e)))?;

        if !output.status.success() {
            let reason = String::from_utf8_lossy(&output.stderr).trim().to_string();
            delete_config_file(&config_path).await.ok();
            tunnel.notify(EngineState::Down);
            return Err(WgCtlError::Engine { reason });
        }

        self.config_paths
            .lock()
            .await
            .insert(tunnel.name().to_string(), config_path);
        tunnel.notify(EngineState::Up);

        info!("Tunnel up: {}", tunnel.name());
        Ok(())
    }

    async fn bring_down(&self, tunnel: &TunnelHandle) -> WgCtlResult<()> {
        info!("Bringing down tunnel: {}", tunnel.name());

        // Prefer the config file we wrote; fall back to the bare name for
        // tunnels brought up outside this engine instance
        let config_path = self.config_paths.lock().await.remove(tunnel.name());
        let target = match &config_path {
            Some(path) => path.to_str().unwrap_or(tunnel.name()).to_string(),
            None => tunnel.name().to_string(),
        };

        let output = Command::new("wg-quick")
            .args(["down", &target])
            .output()
            .await
            .map_err(|e| WgCtlError::ServiceError(format!("Failed to stop wg-quick: {}", e)))?;

        if let Some(path) = &config_path {
            delete_config_file(path).await.ok();
        }

        if !output.status.success() {
            let reason = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(WgCtlError::Engine { reason });
        }

        tunnel.notify(EngineState::Down);
        info!("Tunnel down: {}", tunnel.name());
        Ok(())
    }
}

impl Default for WgQuickEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelEngine for WgQuickEngine {
    async fn set_state(
        &self,
        tunnel: &TunnelHandle,
        state: DesiredState,
        config: Option<&TunnelConfig>,
    ) -> WgCtlResult<()> {
        match state {
            DesiredState::Up => {
                let config = config.ok_or_else(|| {
                    WgCtlError::InvalidParameter("set_state(Up) requires a config".to_string())
                })?;
                self.bring_up(tunnel, config).await
            }
            DesiredState::Down => self.bring_down(tunnel).await,
        }
    }

    async fn running_tunnels(&self) -> WgCtlResult<Vec<String>> {
        let output = Command::new("wg")
            .args(["show", "interfaces"])
            .output()
            .await
            .map_err(|e| WgCtlError::ServiceError(format!("Failed to run wg: {}", e)))?;

        if !output.status.success() {
            return Err(WgCtlError::Engine {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let names = String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        debug!("Running tunnels: {:?}", names);
        Ok(names)
    }

    async fn statistics(&self, tunnel: &str) -> WgCtlResult<TrafficStats> {
        let output = Command::new("wg")
            .args(["show", tunnel, "dump"])
            .output()
            .await
            .map_err(|e| WgCtlError::ServiceError(format!("Failed to run wg: {}", e)))?;

        if !output.status.success() {
            // wg errors out for interfaces it has no record of
            return Err(WgCtlError::Stats(format!(
                "no statistics for tunnel '{}': {}",
                tunnel,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut stats = parse_wg_dump(&String::from_utf8_lossy(&output.stdout));

        // Kernel interface counters also include non-peer overhead; use
        // them when the dump reported nothing
        if stats.rx_bytes == 0 && stats.tx_bytes == 0 {
            if let Ok((rx, tx)) = read_sysfs_stats(tunnel).await {
                stats.rx_bytes = rx;
                stats.tx_bytes = tx;
            }
        }

        Ok(stats)
    }
}

/// Parse `wg show <if> dump` output: one interface line, then one line per
/// peer with handshake timestamp and transfer counters
fn parse_wg_dump(dump: &str) -> TrafficStats {
    let mut stats = TrafficStats::default();

    for line in dump.lines().skip(1) {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 7 {
            continue;
        }

        if stats.peer_endpoint.is_none() && parts[2] != "(none)" {
            stats.peer_endpoint = Some(parts[2].to_string());
        }
        if let Ok(timestamp) = parts[4].parse::<u64>() {
            if timestamp > 0 {
                stats.last_handshake =
                    Some(SystemTime::UNIX_EPOCH + Duration::from_secs(timestamp));
            }
        }
        if let Ok(rx) = parts[5].parse::<u64>() {
            stats.rx_bytes += rx;
        }
        if let Ok(tx) = parts[6].parse::<u64>() {
            stats.tx_bytes += tx;
        }
    }

    stats
}

async fn check_binary_available(binary: &str) -> bool {
    match Command::new("which").arg(binary).output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Write configuration to a file with restrictive permissions
async fn write_secure_config(path: &Path, content: &str, permissions: u32) -> WgCtlResult<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| WgCtlError::ServiceError(format!("Failed to write config to {:?}: {}", path, e)))?;

    let perms = std::fs::Permissions::from_mode(permissions);
    tokio::fs::set_permissions(path, perms)
        .await
        .map_err(|e| WgCtlError::ServiceError(format!("Failed to set permissions on {:?}: {}", path, e)))?;

    debug!("Wrote config to {:?} with permissions {:o}", path, permissions);
    Ok(())
}

async fn delete_config_file(path: &Path) -> WgCtlResult<()> {
    if path.exists() {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| WgCtlError::ServiceError(format!("Failed to delete {:?}: {}", path, e)))?;
        debug!("Deleted config file: {:?}", path);
    }
    Ok(())
}

/// Interface statistics from /sys/class/net
async fn read_sysfs_stats(interface: &str) -> WgCtlResult<(u64, u64)> {
    let base_path = format!("/sys/class/net/{}/statistics", interface);

    let rx_bytes = tokio::fs::read_to_string(format!("{}/rx_bytes", base_path))
        .await
        .map_err(|e| WgCtlError::ServiceError(format!("Failed to read rx_bytes: {}", e)))?
        .trim()
        .parse::<u64>()
        .unwrap_or(0);

    let tx_bytes = tokio::fs::read_to_string(format!("{}/tx_bytes", base_path))
        .await
        .map_err(|e| WgCtlError::ServiceError(format!("Failed to read tx_bytes: {}", e)))?
        .trim()
        .parse::<u64>()
        .unwrap_or(0);

    Ok((rx_bytes, tx_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wg_dump_sums_peers() {
        let dump = "\
privkey=\tpubkey=\t51820\toff
peer1=\t(none)\t203.0.113.5:51820\t0.0.0.0/0\t1700000000\t1024\t2048\t25
peer2=\t(none)\t(none)\t10.0.0.0/24\t0\t100\t200\toff
";
        let stats = parse_wg_dump(dump);
        assert_eq!(stats.rx_bytes, 1124);
        assert_eq!(stats.tx_bytes, 2248);
        assert_eq!(stats.peer_endpoint.as_deref(), Some("203.0.113.5:51820"));
        assert!(stats.last_handshake.is_some());
    }

    #[test]
    fn test_parse_wg_dump_interface_only() {
        let stats = parse_wg_dump("privkey=\tpubkey=\t51820\toff\n");
        assert_eq!(stats.rx_bytes, 0);
        assert_eq!(stats.tx_bytes, 0);
        assert!(stats.peer_endpoint.is_none());
    }

    #[tokio::test]
    async fn test_config_file_write_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.conf");
        write_secure_config(&path, "[Interface]\n", 0o600).await.unwrap();
        assert!(path.exists());
        delete_config_file(&path).await.unwrap();
        assert!(!path.exists());
    }
}
