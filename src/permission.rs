//! Platform permission flow
//!
//! Acquiring the OS VPN capability is a platform concern (a prompt on
//! mobile shells, an ambient capability on servers). The controller only
//! consumes the resulting grant flag; the broker decides how to obtain it.

use async_trait::async_trait;
use tracing::debug;

/// External collaborator that resolves the OS VPN capability
///
/// `request` may take arbitrary time (e.g. an interactive prompt); the
/// controller records the answer asynchronously.
#[async_trait]
pub trait PermissionBroker: Send + Sync {
    async fn request(&self) -> bool;
}

/// Broker for environments where the capability is ambient: granted when
/// running with effective UID 0, which is what the wg-quick engine needs
pub struct EuidBroker;

#[async_trait]
impl PermissionBroker for EuidBroker {
    async fn request(&self) -> bool {
        let granted = unsafe { libc::geteuid() } == 0;
        debug!("Permission request resolved: granted={}", granted);
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_euid_broker_matches_euid() {
        let granted = EuidBroker.request().await;
        assert_eq!(granted, unsafe { libc::geteuid() } == 0);
    }
}
