//! Canonical home directory resolution for atc
//!
//! Every path the controller persists is derived from one home directory so
//! that tests and custom deployments can relocate all state with a single
//! `ATC_HOME` override.
//!
//! # Precedence
//!
//! 1. `ATC_HOME` environment variable (if set and non-empty after trimming)
//! 2. `dirs::home_dir()` platform default
//!
//! # Testing
//!
//! Integration tests MUST use `ATC_HOME` (or pass an explicit storage root)
//! instead of touching the real `~/.claude` tree.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the home directory for atc operations
///
/// # Errors
///
/// Returns an error if `ATC_HOME` is unset and the platform home directory
/// cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("ATC_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// Default storage root holding `teams/` and `tasks/` (`<home>/.claude`).
pub fn default_storage_root() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(".claude"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn with_atc_home<F: FnOnce()>(value: Option<&str>, f: F) {
        let original = env::var("ATC_HOME").ok();
        unsafe {
            match value {
                Some(v) => env::set_var("ATC_HOME", v),
                None => env::remove_var("ATC_HOME"),
            }
        }
        f();
        unsafe {
            match original {
                Some(v) => env::set_var("ATC_HOME", v),
                None => env::remove_var("ATC_HOME"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_atc_home_set() {
        with_atc_home(Some("/custom/home"), || {
            assert_eq!(get_home_dir().unwrap(), PathBuf::from("/custom/home"));
        });
    }

    #[test]
    #[serial]
    fn test_atc_home_trims_whitespace() {
        with_atc_home(Some("  /custom/home  "), || {
            assert_eq!(get_home_dir().unwrap(), PathBuf::from("/custom/home"));
        });
    }

    #[test]
    #[serial]
    fn test_atc_home_blank_uses_platform_default() {
        with_atc_home(Some("   "), || {
            assert_eq!(get_home_dir().unwrap(), dirs::home_dir().unwrap());
        });
    }

    #[test]
    #[serial]
    fn test_storage_root_is_dot_claude() {
        with_atc_home(Some("/srv/atc"), || {
            assert_eq!(
                default_storage_root().unwrap(),
                PathBuf::from("/srv/atc/.claude")
            );
        });
    }
}
