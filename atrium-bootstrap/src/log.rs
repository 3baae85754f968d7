use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_rolling_file::RollingFileAppenderBase;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, registry, util::SubscriberInitExt};

use crate::{
    config::{Config, ConfigPrefix, RunMode},
    error::LaunchError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    log_level: Level,
    enable_console: bool,
    enable_file: bool,
    log_file_path: String,
    log_file_max_size: u64,
    log_file_max_count: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::default(),
            enable_console: true,
            enable_file: false,
            log_file_path: "logs/atrium.log".to_string(),
            log_file_max_size: 64 * 1024 * 1024,
            log_file_max_count: 7,
        }
    }
}

impl LoggingConfig {
    pub fn from_config(config: &Config) -> Result<Self, config::ConfigError> {
        config.get()
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }

    pub fn enable_console(&self) -> bool {
        self.enable_console
    }

    pub fn enable_file(&self) -> bool {
        self.enable_file
    }

    pub fn log_file_path(&self) -> &str {
        &self.log_file_path
    }

    /// Default filter directive. Development lowers an unconfigured level
    /// to `debug`; an explicit non-default level always wins.
    pub(crate) fn directive(&self, mode: RunMode) -> &'static str {
        if mode.debug() && matches!(self.log_level, Level::Info) {
            Level::Debug.as_str()
        } else {
            self.log_level.as_str()
        }
    }
}

impl ConfigPrefix for LoggingConfig {
    const PREFIX: &'static str = "logging";
}

#[derive(Debug, Default, Copy, Clone, Serialize, PartialEq, Eq)]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        const VARIANTS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| <D::Error as serde::de::Error>::unknown_variant(&s, &VARIANTS))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct ParseLevelError;

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("trace") => Ok(Level::Trace),
            s if s.eq_ignore_ascii_case("debug") => Ok(Level::Debug),
            s if s.eq_ignore_ascii_case("info") => Ok(Level::Info),
            s if s.eq_ignore_ascii_case("warn") => Ok(Level::Warn),
            s if s.eq_ignore_ascii_case("error") => Ok(Level::Error),
            s if s.eq_ignore_ascii_case("off") => Ok(Level::Off),
            _ => Err(ParseLevelError),
        }
    }
}

impl Level {
    /// Lowercase name, also a valid `EnvFilter` directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Keeps the non-blocking writer guards alive for the process lifetime.
/// Dropping this flushes and stops the background log writers.
pub struct AppenderGuard {
    _guards: Vec<WorkerGuard>,
}

impl AppenderGuard {
    pub(crate) fn new(guards: Vec<WorkerGuard>) -> Self {
        Self { _guards: guards }
    }
}

/// Installs the global tracing subscriber: an optional console appender and
/// an optional rolling file appender, both non-blocking, behind a filter
/// taken from `RUST_LOG` when set.
pub(crate) fn init(config: &LoggingConfig, mode: RunMode) -> Result<AppenderGuard, LaunchError> {
    let mut guards = Vec::new();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directive(mode)));

    let console_layer = if config.enable_console() {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        Some(tracing_subscriber::fmt::layer().with_writer(writer))
    } else {
        None
    };

    let file_layer = if config.enable_file() {
        if config.log_file_path().trim().is_empty() {
            return Err(LaunchError::InvalidConfigValueError(
                "logging.log_file_path is empty".to_string(),
            ));
        }
        let appender = RollingFileAppenderBase::builder()
            .filename(config.log_file_path().to_string())
            .max_filecount(config.log_file_max_count)
            .condition_max_file_size(config.log_file_max_size)
            .condition_daily()
            .build()
            .map_err(|e| {
                LaunchError::LogFileCreationError(
                    <Box<dyn std::error::Error + Send + Sync>>::from(e),
                )
            })?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
    } else {
        None
    };

    registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LaunchError::TracingSubscriberInitError(Box::new(e)))?;

    Ok(AppenderGuard::new(guards))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("trace", Level::Trace)]
    #[case("INFO", Level::Info)]
    #[case("Off", Level::Off)]
    fn parses_levels(#[case] raw: &str, #[case] expected: Level) {
        assert_eq!(raw.parse::<Level>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn defaults_are_console_only() {
        let config = LoggingConfig::default();
        assert!(config.enable_console());
        assert!(!config.enable_file());
        assert_eq!(config.log_level(), Level::Info);
    }

    #[rstest]
    #[case(RunMode::Development, Level::Info, "debug")]
    #[case(RunMode::Development, Level::Warn, "warn")]
    #[case(RunMode::Production, Level::Info, "info")]
    fn development_lowers_default_directive(
        #[case] mode: RunMode,
        #[case] level: Level,
        #[case] expected: &str,
    ) {
        let config = LoggingConfig {
            log_level: level,
            ..LoggingConfig::default()
        };
        assert_eq!(config.directive(mode), expected);
    }
}
