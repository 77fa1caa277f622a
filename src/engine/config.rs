use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;

use crate::error::{WgCtlError, WgCtlResult};

/// All-zero peer key used by the throwaway takeover configuration
const TAKEOVER_PEER_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Parsed wg-quick configuration
///
/// The controller treats this as an opaque token after parse; only the
/// engine adapter reads it back out (via `render`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    pub interface: InterfaceSection,
    pub peers: Vec<PeerSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSection {
    pub private_key: String,
    pub addresses: Vec<String>,
    pub listen_port: Option<u16>,
    pub dns: Option<String>,
    pub mtu: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSection {
    pub public_key: String,
    pub allowed_ips: Vec<String>,
    pub endpoint: Option<String>,
    pub persistent_keepalive: Option<u16>,
    pub preshared_key: Option<String>,
}

impl TunnelConfig {
    /// Parse wg-quick configuration text
    pub fn parse(text: &str) -> WgCtlResult<Self> {
        let mut interface = InterfaceSection::default();
        let mut peers: Vec<PeerSection> = Vec::new();
        let mut section = Section::None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = match line[1..line.len() - 1].trim() {
                    s if s.eq_ignore_ascii_case("Interface") => Section::Interface,
                    s if s.eq_ignore_ascii_case("Peer") => {
                        peers.push(PeerSection::default());
                        Section::Peer
                    }
                    other => {
                        return Err(WgCtlError::ConfigParse(
                            format!("unknown section [{}] at line {}", other, lineno + 1)
                        ));
                    }
                };
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                WgCtlError::ConfigParse(format!("expected 'Key = Value' at line {}", lineno + 1))
            })?;
            let key = key.trim();
            let value = value.trim();

            match section {
                Section::None => {
                    return Err(WgCtlError::ConfigParse(
                        format!("'{}' outside of any section at line {}", key, lineno + 1)
                    ));
                }
                Section::Interface => parse_interface_entry(&mut interface, key, value, lineno + 1)?,
                Section::Peer => {
                    // Section::Peer implies at least one entry
                    let peer = peers.last_mut().unwrap();
                    parse_peer_entry(peer, key, value, lineno + 1)?;
                }
            }
        }

        if interface.private_key.is_empty() {
            return Err(WgCtlError::ConfigParse("missing interface PrivateKey".to_string()));
        }
        if peers.is_empty() {
            return Err(WgCtlError::ConfigParse("no [Peer] section".to_string()));
        }
        for peer in &peers {
            if peer.public_key.is_empty() {
                return Err(WgCtlError::ConfigParse("missing peer PublicKey".to_string()));
            }
        }

        Ok(Self { interface, peers })
    }

    /// Render back to wg-quick configuration text
    pub fn render(&self) -> String {
        let mut cfg = String::new();

        cfg.push_str("[Interface]\n");
        cfg.push_str(&format!("PrivateKey = {}\n", self.interface.private_key));
        if !self.interface.addresses.is_empty() {
            cfg.push_str(&format!("Address = {}\n", self.interface.addresses.join(", ")));
        }
        if let Some(port) = self.interface.listen_port {
            cfg.push_str(&format!("ListenPort = {}\n", port));
        }
        if let Some(dns) = &self.interface.dns {
            cfg.push_str(&format!("DNS = {}\n", dns));
        }
        if let Some(mtu) = self.interface.mtu {
            cfg.push_str(&format!("MTU = {}\n", mtu));
        }

        for peer in &self.peers {
            cfg.push_str("\n[Peer]\n");
            cfg.push_str(&format!("PublicKey = {}\n", peer.public_key));
            if !peer.allowed_ips.is_empty() {
                cfg.push_str(&format!("AllowedIPs = {}\n", peer.allowed_ips.join(", ")));
            }
            if let Some(endpoint) = &peer.endpoint {
                cfg.push_str(&format!("Endpoint = {}\n", endpoint));
            }
            if let Some(keepalive) = peer.persistent_keepalive {
                cfg.push_str(&format!("PersistentKeepalive = {}\n", keepalive));
            }
            if let Some(psk) = &peer.preshared_key {
                cfg.push_str(&format!("PresharedKey = {}\n", psk));
            }
        }

        cfg
    }

    /// Minimal non-routable configuration used by the takeover teardown
    /// strategy: bringing it up forces the engine to take ownership of
    /// whatever VPN interface is active so it can be torn down.
    pub fn throwaway() -> Self {
        Self {
            interface: InterfaceSection {
                private_key: generate_private_key(),
                addresses: vec!["10.0.0.1/32".to_string()],
                ..Default::default()
            },
            peers: vec![PeerSection {
                public_key: TAKEOVER_PEER_KEY.to_string(),
                allowed_ips: vec!["0.0.0.0/0".to_string()],
                ..Default::default()
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Interface,
    Peer,
}

fn parse_interface_entry(
    interface: &mut InterfaceSection,
    key: &str,
    value: &str,
    lineno: usize,
) -> WgCtlResult<()> {
    match key.to_ascii_lowercase().as_str() {
        "privatekey" => interface.private_key = value.to_string(),
        "address" => {
            for addr in value.split(',') {
                let addr = addr.trim();
                if !is_valid_cidr(addr) && !is_valid_ip(addr) {
                    return Err(WgCtlError::ConfigParse(
                        format!("invalid address '{}' at line {}", addr, lineno)
                    ));
                }
                interface.addresses.push(addr.to_string());
            }
        }
        "listenport" => {
            interface.listen_port = Some(value.parse().map_err(|_| {
                WgCtlError::ConfigParse(format!("invalid ListenPort at line {}", lineno))
            })?);
        }
        "dns" => interface.dns = Some(value.to_string()),
        "mtu" => {
            interface.mtu = Some(value.parse().map_err(|_| {
                WgCtlError::ConfigParse(format!("invalid MTU at line {}", lineno))
            })?);
        }
        // wg-quick extensions (Table, PreUp, PostDown, ...) pass through the
        // engine untouched; the controller does not reinterpret them
        _ => {}
    }
    Ok(())
}

fn parse_peer_entry(
    peer: &mut PeerSection,
    key: &str,
    value: &str,
    lineno: usize,
) -> WgCtlResult<()> {
    match key.to_ascii_lowercase().as_str() {
        "publickey" => peer.public_key = value.to_string(),
        "allowedips" => {
            for ip in value.split(',') {
                let ip = ip.trim();
                if !is_valid_cidr(ip) {
                    return Err(WgCtlError::ConfigParse(
                        format!("invalid allowed IP '{}' at line {}", ip, lineno)
                    ));
                }
                peer.allowed_ips.push(ip.to_string());
            }
        }
        "endpoint" => {
            if !value.contains(':') {
                return Err(WgCtlError::ConfigParse(
                    format!("peer endpoint must be 'host:port' at line {}", lineno)
                ));
            }
            peer.endpoint = Some(value.to_string());
        }
        "persistentkeepalive" => {
            peer.persistent_keepalive = Some(value.parse().map_err(|_| {
                WgCtlError::ConfigParse(format!("invalid PersistentKeepalive at line {}", lineno))
            })?);
        }
        "presharedkey" => peer.preshared_key = Some(value.to_string()),
        _ => {}
    }
    Ok(())
}

/// Generate a fresh Curve25519 private key, clamped per RFC 7748
fn generate_private_key() -> String {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key[0] &= 248;
    key[31] &= 127;
    key[31] |= 64;
    BASE64.encode(key)
}

fn is_valid_ip(addr: &str) -> bool {
    addr.parse::<std::net::IpAddr>().is_ok()
}

/// Validate CIDR notation (e.g. "10.0.0.1/24")
fn is_valid_cidr(cidr: &str) -> bool {
    if let Some((ip, prefix)) = cidr.split_once('/') {
        if let Ok(prefix_len) = prefix.parse::<u8>() {
            if ip.parse::<std::net::Ipv4Addr>().is_ok() {
                return prefix_len <= 32;
            } else if ip.parse::<std::net::Ipv6Addr>().is_ok() {
                return prefix_len <= 128;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[Interface]
PrivateKey = cPYJmUNNbGCgF7Yhbk4rXLo+1uty0DgpqJX0pDoJ2U8=
Address = 10.8.0.2/24
DNS = 1.1.1.1
MTU = 1420

[Peer]
PublicKey = JRI8Xc0zKP9kXk8qP8X6K0xXyTnJwFyVxXyTnJwFyVk=
AllowedIPs = 0.0.0.0/0
Endpoint = vpn.example.com:51820
PersistentKeepalive = 25
";

    #[test]
    fn test_parse_sample_config() {
        let cfg = TunnelConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.interface.addresses, vec!["10.8.0.2/24"]);
        assert_eq!(cfg.interface.dns.as_deref(), Some("1.1.1.1"));
        assert_eq!(cfg.interface.mtu, Some(1420));
        assert_eq!(cfg.peers.len(), 1);
        assert_eq!(cfg.peers[0].endpoint.as_deref(), Some("vpn.example.com:51820"));
        assert_eq!(cfg.peers[0].persistent_keepalive, Some(25));
    }

    #[test]
    fn test_parse_rejects_missing_private_key() {
        let text = "[Interface]\nAddress = 10.0.0.2/24\n\n[Peer]\nPublicKey = x\n";
        match TunnelConfig::parse(text) {
            Err(WgCtlError::ConfigParse(msg)) => assert!(msg.contains("PrivateKey")),
            other => panic!("expected ConfigParse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_missing_peer() {
        let text = "[Interface]\nPrivateKey = abc=\n";
        assert!(TunnelConfig::parse(text).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_endpoint() {
        let text = "\
[Interface]
PrivateKey = abc=

[Peer]
PublicKey = def=
Endpoint = no-port-here
";
        assert!(TunnelConfig::parse(text).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TunnelConfig::parse("not a config at all").is_err());
        assert!(TunnelConfig::parse("").is_err());
    }

    #[test]
    fn test_render_contains_all_fields() {
        let cfg = TunnelConfig::parse(SAMPLE).unwrap();
        let text = cfg.render();
        assert!(text.contains("PrivateKey = cPYJmUNNbGCgF7Yhbk4rXLo+1uty0DgpqJX0pDoJ2U8="));
        assert!(text.contains("AllowedIPs = 0.0.0.0/0"));
        assert!(text.contains("PersistentKeepalive = 25"));
    }

    #[test]
    fn test_throwaway_is_minimal_and_non_routable() {
        let cfg = TunnelConfig::throwaway();
        assert_eq!(cfg.interface.addresses, vec!["10.0.0.1/32"]);
        assert_eq!(cfg.peers.len(), 1);
        assert_eq!(cfg.peers[0].public_key, TAKEOVER_PEER_KEY);
        assert_eq!(cfg.peers[0].allowed_ips, vec!["0.0.0.0/0"]);
        // A fresh key per call
        assert_ne!(cfg.interface.private_key, TunnelConfig::throwaway().interface.private_key);
    }
}
