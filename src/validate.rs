//! Input validation for user-supplied hosts, ports and paths.
//!
//! Every value that ends up in a spawned argv or in the profile document
//! passes through here first. Hosts are checked against shell
//! metacharacters even though commands are built as argv vectors; a value
//! that needs quoting to be safe is not a hostname.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Maximum hostname length per RFC 1035.
const MAX_HOSTNAME_LEN: usize = 253;

/// Characters that never occur in a legitimate hostname but do occur in
/// injection attempts.
const FORBIDDEN_HOST_CHARS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '<', '>'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid hostname: {0:?}")]
    Hostname(String),

    #[error("invalid port: {0:?} (expected 1-65535)")]
    Port(String),

    #[error("invalid path: {0:?}")]
    Path(String),

    #[error("invalid MAC address: {0}")]
    Mac(String),
}

/// Accepts plain hostnames and IP literals; rejects empty input, over-long
/// input and anything containing shell metacharacters.
pub fn validate_hostname(host: &str) -> Result<(), ValidationError> {
    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
        return Err(ValidationError::Hostname(host.to_string()));
    }
    if host.chars().any(|c| FORBIDDEN_HOST_CHARS.contains(&c)) {
        return Err(ValidationError::Hostname(host.to_string()));
    }
    Ok(())
}

/// Accepts exactly the integers 1..=65535.
pub fn validate_port(port: u16) -> Result<u16, ValidationError> {
    if port == 0 {
        return Err(ValidationError::Port(port.to_string()));
    }
    Ok(port)
}

/// Parses and validates a port given as text (CLI and wire input arrive as
/// strings). Rejects non-numeric input, 0, values above 65535 and negatives.
pub fn parse_port(text: &str) -> Result<u16, ValidationError> {
    let port: u16 = text
        .trim()
        .parse()
        .map_err(|_| ValidationError::Port(text.to_string()))?;
    validate_port(port)
}

/// Expands a leading `~`, rejects any `..` component, and absolutizes the
/// rest against the current directory. The result is safe to hand to an
/// external tool as a single argv element.
pub fn sanitize_path(input: &str) -> Result<PathBuf, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Path(input.to_string()));
    }

    let expanded = expand_home(input).ok_or_else(|| ValidationError::Path(input.to_string()))?;

    if expanded
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ValidationError::Path(input.to_string()));
    }

    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd =
        std::env::current_dir().map_err(|_| ValidationError::Path(input.to_string()))?;
    Ok(cwd.join(expanded))
}

/// Parses a MAC address in `AA:BB:CC:DD:EE:FF`, `AA-BB-...` or bare-hex
/// notation into its six bytes.
pub fn parse_mac(input: &str) -> Result<[u8; 6], ValidationError> {
    let hex: String = input
        .chars()
        .filter(|c| !matches!(c, ':' | '-'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::Mac(input.to_string()));
    }

    let mut mac = [0u8; 6];
    for (i, byte) in mac.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| ValidationError::Mac(input.to_string()))?;
    }
    Ok(mac)
}

fn expand_home(input: &str) -> Option<PathBuf> {
    if let Some(rest) = input.strip_prefix("~/") {
        return dirs::home_dir().map(|h| h.join(rest));
    }
    if input == "~" {
        return dirs::home_dir();
    }
    Some(Path::new(input).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_hostnames_and_ipv4() {
        assert!(validate_hostname("lab1.example.com").is_ok());
        assert!(validate_hostname("10.0.0.5").is_ok());
        assert!(validate_hostname("host-with-dash").is_ok());
    }

    #[test]
    fn rejects_metacharacters() {
        for host in [
            "10.0.0.5; rm -rf /",
            "host&payload",
            "host|cat",
            "host`id`",
            "host$(id)",
            "host<file",
            "host>file",
            "host(x)",
        ] {
            assert!(validate_hostname(host).is_err(), "accepted {host:?}");
        }
    }

    #[test]
    fn rejects_empty_and_overlong_hostnames() {
        assert!(validate_hostname("").is_err());
        assert!(validate_hostname(&"a".repeat(253)).is_ok());
        assert!(validate_hostname(&"a".repeat(254)).is_err());
    }

    #[test]
    fn port_range_is_exact() {
        assert!(validate_port(0).is_err());
        assert_eq!(validate_port(1), Ok(1));
        assert_eq!(validate_port(22), Ok(22));
        assert_eq!(validate_port(65535), Ok(65535));
    }

    #[test]
    fn port_parsing_rejects_garbage() {
        assert!(parse_port("ssh").is_err());
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("-5").is_err());
        assert_eq!(parse_port(" 3389 "), Ok(3389));
    }

    #[test]
    fn paths_with_parent_components_are_rejected() {
        assert!(sanitize_path("/etc/../etc/passwd").is_err());
        assert!(sanitize_path("../up").is_err());
        assert!(sanitize_path("dir/../../other").is_err());
    }

    #[test]
    fn relative_paths_become_absolute() {
        let p = sanitize_path("notes/backup.tar").unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("notes/backup.tar"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let p = sanitize_path("~/backups").unwrap();
        let home = dirs::home_dir().unwrap();
        assert!(p.starts_with(home));
    }

    #[test]
    fn mac_parsing_accepts_common_notations() {
        let expected = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        assert_eq!(parse_mac("AA:BB:CC:DD:EE:FF").unwrap(), expected);
        assert_eq!(parse_mac("aa-bb-cc-dd-ee-ff").unwrap(), expected);
        assert_eq!(parse_mac("aabbccddeeff").unwrap(), expected);
    }

    #[test]
    fn mac_parsing_rejects_bad_input() {
        assert!(parse_mac("").is_err());
        assert!(parse_mac("aa:bb:cc:dd:ee").is_err());
        assert!(parse_mac("aa:bb:cc:dd:ee:ff:00").is_err());
        assert!(parse_mac("zz:bb:cc:dd:ee:ff").is_err());
    }
}
