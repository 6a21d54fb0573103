use crate::error::{Error, Result};
use std::path::PathBuf;

/// Environment file used when `--env-file` is not given.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Tool configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "deploywire.toml";

/// Expand `~` and `$VAR` references in a user-supplied path.
pub fn expand(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).map_err(|e| {
        Error::validation_invalid_argument(
            "path",
            format!("Cannot expand '{}': {}", raw, e),
            None,
            None,
        )
    })?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Environment file path, honoring an explicit override.
pub fn env_file(explicit: Option<&str>) -> Result<PathBuf> {
    expand(explicit.unwrap_or(DEFAULT_ENV_FILE))
}

/// Configuration file path, honoring an explicit override.
pub fn config_file(explicit: Option<&str>) -> Result<PathBuf> {
    expand(explicit.unwrap_or(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_relative_to_cwd() {
        assert_eq!(env_file(None).unwrap(), PathBuf::from(".env"));
        assert_eq!(config_file(None).unwrap(), PathBuf::from("deploywire.toml"));
    }

    #[test]
    fn expand_resolves_home() {
        if let Ok(home) = std::env::var("HOME") {
            let path = expand("~/project/.env").unwrap();
            assert_eq!(path, PathBuf::from(home).join("project/.env"));
        }
    }

    #[test]
    fn expand_rejects_undefined_variable() {
        let err = expand("$DEPLOYWIRE_SURELY_UNDEFINED_VAR/.env").unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }
}
