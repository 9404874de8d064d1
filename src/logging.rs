//! Log output setup.
//!
//! The library itself only emits `tracing` events. Applications call
//! [`init_logging`] once at startup to install a subscriber; it needs the
//! `profiling` feature and is a no-op without it.

use crate::config::LogConfig;
use crate::error::Result;

/// Keeps the background log writer alive; logs are flushed when dropped
#[must_use = "dropping the guard stops log output"]
pub struct LogGuard {
    #[cfg(feature = "profiling")]
    _writer: tracing_appender::non_blocking::WorkerGuard,
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard").finish_non_exhaustive()
    }
}

/// Install the global subscriber described by `config`
#[cfg(feature = "profiling")]
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    use crate::error::AssetError;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| AssetError::ConfigError(format!("log level {:?}: {e}", config.level)))?;

    let (writer, guard) = match &config.directory {
        Some(directory) => tracing_appender::non_blocking(tracing_appender::rolling::daily(
            directory,
            &config.file_prefix,
        )),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.directory.is_none());
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| AssetError::ConfigError(format!("logging already initialized: {e}")))?;

    tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    Ok(LogGuard { _writer: guard })
}

/// Install the global subscriber described by `config`
#[cfg(not(feature = "profiling"))]
pub fn init_logging(_config: &LogConfig) -> Result<LogGuard> {
    Ok(LogGuard {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "profiling")]
    #[test]
    fn test_rejects_bad_filter() {
        let config = LogConfig {
            level: "group_assets=loud".to_string(),
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_err());
    }

    #[cfg(not(feature = "profiling"))]
    #[test]
    fn test_noop_without_profiling() {
        assert!(init_logging(&LogConfig::default()).is_ok());
    }
}
