//! Interface name validation and sysfs index lookup.

use std::path::Path;

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Error type for interface lookups.
#[derive(Debug, thiserror::Error)]
pub enum IfError {
    #[error("interface not found: {0}")]
    NotFound(String),

    #[error("invalid interface name: {0}")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, IfError>;

/// Validate an interface name.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IfError::InvalidName("empty name".to_string()));
    }

    if name.len() >= IFNAMSIZ {
        return Err(IfError::InvalidName(format!(
            "name too long (max {} chars)",
            IFNAMSIZ - 1
        )));
    }

    if name.contains('/') || name.contains('\0') || name.chars().any(char::is_whitespace) {
        return Err(IfError::InvalidName(name.to_string()));
    }

    Ok(())
}

/// Convert an interface name to its index by reading `<sysfs_net>/<name>/ifindex`.
pub fn name_to_index_in(sysfs_net: &Path, name: &str) -> Result<u32> {
    validate(name)?;

    let path = sysfs_net.join(name).join("ifindex");
    let content =
        std::fs::read_to_string(&path).map_err(|_| IfError::NotFound(name.to_string()))?;

    content
        .trim()
        .parse()
        .map_err(|_| IfError::NotFound(name.to_string()))
}

/// Convert an interface name to index using `/sys/class/net`.
pub fn name_to_index(name: &str) -> Result<u32> {
    name_to_index_in(Path::new("/sys/class/net"), name)
}
