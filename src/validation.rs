//! Input validation and sanitization
//!
//! Tunnel names are passed to external tools, so validation doubles as
//! command-injection prevention.

use crate::error::{WgCtlError, WgCtlResult};

/// Maximum length for tunnel names (Linux interface name limit is 15)
const MAX_TUNNEL_NAME_LEN: usize = 15;

/// Validate a tunnel name against the engine naming rule
///
/// Tunnel names become network interface names, so they are limited to
/// 15 characters from the set `[a-zA-Z0-9_=+.-]` and may not be empty.
pub fn validate_tunnel_name(name: &str) -> WgCtlResult<()> {
    if name.is_empty() {
        return Err(WgCtlError::InvalidName(
            "tunnel name cannot be empty".to_string()
        ));
    }

    if name.len() > MAX_TUNNEL_NAME_LEN {
        return Err(WgCtlError::InvalidName(
            format!("tunnel name too long (max {} characters)", MAX_TUNNEL_NAME_LEN)
        ));
    }

    // The allowed set matches the engine's tunnel naming rule and excludes
    // shell metacharacters
    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && !matches!(c, '_' | '=' | '+' | '.' | '-') {
            return Err(WgCtlError::InvalidName(
                format!("tunnel name '{}' contains invalid character '{}'", name, c)
            ));
        }
    }

    // A leading dash could be interpreted as an option by external tools
    if name.starts_with('-') {
        return Err(WgCtlError::InvalidName(
            "tunnel name cannot start with dash".to_string()
        ));
    }

    Ok(())
}
