//! Shared logging initialization for atc binaries.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

fn parse_level(raw: Option<&str>) -> tracing::Level {
    match raw.unwrap_or("info").to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Initialize process-level tracing output from `ATC_LOG`.
///
/// This is safe to call multiple times; only the first call initializes the
/// subscriber. It is best-effort and never returns an error.
pub fn init() {
    let level = parse_level(std::env::var("ATC_LOG").ok().as_deref());
    init_with_level(level);
}

/// Initialize tracing with an explicit level, ignoring `ATC_LOG`.
pub fn init_with_level(level: tracing::Level) {
    if INIT.get().is_some() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_accepts_known_names_case_insensitively() {
        assert_eq!(parse_level(Some("TRACE")), tracing::Level::TRACE);
        assert_eq!(parse_level(Some("debug")), tracing::Level::DEBUG);
        assert_eq!(parse_level(Some("Warn")), tracing::Level::WARN);
        assert_eq!(parse_level(Some("error")), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_level_defaults_to_info() {
        assert_eq!(parse_level(None), tracing::Level::INFO);
        assert_eq!(parse_level(Some("verbose")), tracing::Level::INFO);
    }
}
