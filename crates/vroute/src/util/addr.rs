//! Address and prefix parsing.

use std::net::IpAddr;

/// Error type for address parsing.
#[derive(Debug, thiserror::Error)]
pub enum AddrError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),
}

pub type Result<T> = std::result::Result<T, AddrError>;

/// Parse an IP address from string.
pub fn parse_addr(s: &str) -> Result<IpAddr> {
    s.parse()
        .map_err(|_| AddrError::InvalidAddress(s.to_string()))
}

/// Host prefix length for an address family.
pub fn max_prefix_len(addr: &IpAddr) -> u8 {
    if addr.is_ipv4() { 32 } else { 128 }
}

/// Parse an IP address with optional prefix length (CIDR notation).
/// A bare address is a host prefix.
pub fn parse_prefix(s: &str) -> Result<(IpAddr, u8)> {
    let Some((addr_str, prefix_str)) = s.split_once('/') else {
        let addr = parse_addr(s)?;
        return Ok((addr, max_prefix_len(&addr)));
    };

    let addr = parse_addr(addr_str)?;
    let prefix: u8 = prefix_str
        .parse()
        .map_err(|_| AddrError::InvalidPrefix(prefix_str.to_string()))?;

    if prefix > max_prefix_len(&addr) {
        return Err(AddrError::InvalidPrefix(format!(
            "{} exceeds maximum {} for address family",
            prefix,
            max_prefix_len(&addr)
        )));
    }

    Ok((addr, prefix))
}
