//! Input validation primitives.

use alloy_primitives::Address;

use crate::error::{Error, Result};

/// Parse `0x` followed by exactly 40 hex digits.
///
/// Checksum casing is not verified.
pub fn parse_address(value: &str) -> Option<Address> {
    let value = value.trim();
    if !value.starts_with("0x") {
        return None;
    }
    value.parse().ok()
}

/// Require a 20-byte hex address.
pub fn require_address(value: &str, field: &str) -> Result<Address> {
    parse_address(value).ok_or_else(|| {
        Error::validation_invalid_argument(
            field,
            format!("'{}' is not a 0x-prefixed 20-byte hex address", value.trim()),
            None,
            None,
        )
    })
}

/// True when `key` is a valid environment variable name.
pub fn is_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
