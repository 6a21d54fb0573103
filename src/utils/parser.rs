//! Core parsing primitives for text extraction.
//!
//! Deploy output scraping and `cast` output handling are built on these.

use crate::error::{Error, Result};
use regex::Regex;

/// Extract first match from content using regex pattern with capture group.
/// Pattern must contain exactly one capture group for the value to extract.
/// Content is trimmed before matching.
pub fn extract_first(content: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(content.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Compile a pattern, reporting which field it came from on failure.
pub fn compile(pattern: &str, field: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        Error::validation_invalid_argument(
            field,
            format!("Invalid regex pattern '{}': {}", pattern, e),
            None,
            None,
        )
    })
}

/// Take the last `0x`-prefixed token from tool output.
///
/// Tools print banners and warnings before the value we want.
pub fn last_hex_token(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .rev()
        .find(|token| token.starts_with("0x"))
        .map(|token| token.to_string())
}
