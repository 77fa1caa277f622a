//! Configuration management for wgctl

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{WgCtlError, WgCtlResult};

/// Main wgctl configuration
///
/// The settle delays are empirically chosen and deliberately tunable; the
/// defaults match the values the teardown ladder was tuned with in
/// production (300 ms after a teardown, 500 ms after a takeover or a
/// service stop).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CtlConfig {
    /// Settle delays between teardown strategies
    pub settle: SettleDelays,
    /// Conventional tunnel name tried when the true running tunnel's name
    /// was never recorded
    #[serde(default = "default_fallback_tunnel")]
    pub fallback_tunnel: String,
    /// Service unit stopped as the last-resort teardown strategy
    #[serde(default = "default_service_unit")]
    pub service_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    /// Wait after issuing set-state DOWN, before re-probing (milliseconds)
    #[serde(default = "default_teardown_ms")]
    pub teardown_ms: u64,
    /// Wait after issuing the takeover set-state UP or a service stop
    /// (milliseconds)
    #[serde(default = "default_takeover_ms")]
    pub takeover_ms: u64,
}

fn default_fallback_tunnel() -> String {
    "wg0".to_string()
}

fn default_service_unit() -> String {
    "wg-quick@wg0".to_string()
}

fn default_teardown_ms() -> u64 {
    300
}

fn default_takeover_ms() -> u64 {
    500
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            teardown_ms: default_teardown_ms(),
            takeover_ms: default_takeover_ms(),
        }
    }
}

impl SettleDelays {
    pub fn teardown(&self) -> Duration {
        Duration::from_millis(self.teardown_ms)
    }

    pub fn takeover(&self) -> Duration {
        Duration::from_millis(self.takeover_ms)
    }
}

impl Default for CtlConfig {
    fn default() -> Self {
        Self {
            settle: SettleDelays::default(),
            fallback_tunnel: default_fallback_tunnel(),
            service_unit: default_service_unit(),
        }
    }
}

impl CtlConfig {
    /// Load configuration from a TOML file
    pub async fn load(path: &Path) -> WgCtlResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| WgCtlError::ServiceError(format!("Failed to read config from {:?}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| WgCtlError::InvalidParameter(format!("Invalid config file {:?}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CtlConfig::default();
        assert_eq!(cfg.settle.teardown_ms, 300);
        assert_eq!(cfg.settle.takeover_ms, 500);
        assert_eq!(cfg.fallback_tunnel, "wg0");
        assert_eq!(cfg.service_unit, "wg-quick@wg0");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: CtlConfig = toml::from_str(
            r#"
            fallback_tunnel = "wg-home"

            [settle]
            teardown_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.fallback_tunnel, "wg-home");
        assert_eq!(cfg.settle.teardown_ms, 50);
        assert_eq!(cfg.settle.takeover_ms, 500);
        assert_eq!(cfg.service_unit, "wg-quick@wg0");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service_unit = \"wg-quick@vpn\"").unwrap();
        let cfg = CtlConfig::load(file.path()).await.unwrap();
        assert_eq!(cfg.service_unit, "wg-quick@vpn");
        assert_eq!(cfg.settle.teardown_ms, 300);
    }
}
