use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

/// OS-level check for whether any VPN transport is currently active
///
/// Deliberately independent of the engine's own bookkeeping: the answer
/// comes from kernel interface introspection, so it also sees tunnels
/// orphaned by a previous process.
#[async_trait]
pub trait VpnProbe: Send + Sync {
    async fn vpn_active(&self) -> bool;
}

/// Probe backed by `/sys/class/net`
///
/// An interface counts as an active VPN transport when it is
/// administratively up and is either a wireguard device (uevent
/// `DEVTYPE=wireguard`) or a tun/tap device (`tun_flags` present).
pub struct SystemVpnProbe {
    sysfs_root: std::path::PathBuf,
}

impl SystemVpnProbe {
    pub fn new() -> Self {
        Self { sysfs_root: "/sys/class/net".into() }
    }

    /// Probe a different sysfs root (test fixtures)
    pub fn with_root(root: impl Into<std::path::PathBuf>) -> Self {
        Self { sysfs_root: root.into() }
    }

    async fn interface_is_vpn(&self, dir: &Path) -> bool {
        if !interface_is_up(dir).await {
            return false;
        }

        // tun/tap devices expose a tun_flags attribute
        if dir.join("tun_flags").exists() {
            return true;
        }

        match tokio::fs::read_to_string(dir.join("uevent")).await {
            Ok(uevent) => uevent
                .lines()
                .any(|line| line.trim() == "DEVTYPE=wireguard"),
            Err(_) => false,
        }
    }
}

impl Default for SystemVpnProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// IFF_UP from the interface flags attribute
async fn interface_is_up(dir: &Path) -> bool {
    match tokio::fs::read_to_string(dir.join("flags")).await {
        Ok(flags) => {
            let flags = flags.trim().trim_start_matches("0x");
            u32::from_str_radix(flags, 16).map(|f| f & 0x1 != 0).unwrap_or(false)
        }
        Err(_) => false,
    }
}

#[async_trait]
impl VpnProbe for SystemVpnProbe {
    async fn vpn_active(&self) -> bool {
        let mut entries = match tokio::fs::read_dir(&self.sysfs_root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("VPN probe failed to read {:?}: {}", self.sysfs_root, e);
                return false;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            if self.interface_is_vpn(&entry.path()).await {
                debug!("VPN probe: active transport {:?}", entry.file_name());
                return true;
            }
        }

        false
    }
}
