//! Logging bootstrap for the bridge binary.

use crate::{Error, Result};

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Install the global JSON log subscriber.
///
/// Fails if `log_level` is not a known level or a subscriber is already set.
pub fn init_logging(log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level)?;

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize log subscriber: {e}")))?;

    info!(level = %level, "Logging initialized");
    Ok(())
}

pub fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level_is_case_insensitive() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level(" warn ").unwrap(), Level::WARN);
    }

    #[test]
    fn test_parse_log_level_rejects_unknown() {
        let err = parse_log_level("verbose").unwrap_err();
        assert!(format!("{err}").contains("verbose"));
    }
}
