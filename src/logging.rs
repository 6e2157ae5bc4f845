//! Tracing subscriber setup.
//!
//! Logs go to stderr so that stdout stays free for serial-style output.
//! `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Result, ServiceError};

/// Filter from `RUST_LOG`, falling back to `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| {
        ServiceError::InitializationError(format!("invalid log level '{}': {}", level, e)).into()
    })
}

fn use_ansi(config: &LoggingConfig) -> bool {
    config.colored && atty::is(atty::Stream::Stderr)
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.with_ansi(use_ansi(config)).try_init(),
    };

    installed.map_err(|e| ServiceError::InitializationError(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        for level in ["trace", "debug", "info", "warn", "error", "magarray=debug"] {
            assert!(build_filter(level).is_ok(), "{}", level);
        }
    }

    #[test]
    fn test_no_ansi_when_disabled() {
        let config = LoggingConfig {
            colored: false,
            ..Default::default()
        };
        assert!(!use_ansi(&config));
    }
}
