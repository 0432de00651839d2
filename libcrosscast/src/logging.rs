//! Logging setup for the Crosscast binaries
//!
//! Logs always go to stderr. Format and level come from `CROSSCAST_LOG_FORMAT`
//! (`text`, `json`, `pretty`) and `CROSSCAST_LOG_LEVEL`; `RUST_LOG`, when set,
//! replaces the level filter entirely.
//!
//! # Examples
//!
//! ```no_run
//! use libcrosscast::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "debug").init();
//! ```

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Dependencies that are chatty at info level
const QUIET_TARGETS: &[&str] = &["sqlx=warn", "hyper=warn", "hyper_util=warn", "reqwest=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain single-line text
    #[default]
    Text,
    /// One JSON object per line, for log shippers
    Json,
    /// Multi-line with colors, for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(LogFormat::Text, "info")
    }
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>) -> Self {
        Self {
            format,
            level: level.into(),
        }
    }

    /// Read `CROSSCAST_LOG_FORMAT` and `CROSSCAST_LOG_LEVEL` through `lookup`
    ///
    /// An unknown format falls back to text rather than failing startup.
    pub fn from_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = lookup("CROSSCAST_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let level = lookup("CROSSCAST_LOG_LEVEL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());

        Self::new(format, level)
    }

    /// Filter directives: the configured level plus quieter dependencies
    pub fn directives(&self) -> String {
        std::iter::once(self.level.as_str())
            .chain(QUIET_TARGETS.iter().copied())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    /// Install the global subscriber
    ///
    /// Returns `false` if a subscriber was already installed, which happens
    /// when tests or embedding code set one up first.
    pub fn try_init(&self) -> bool {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr);

        let result = match self.format {
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_target(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => builder.with_target(false).with_ansi(false).try_init(),
        };

        result.is_ok()
    }

    pub fn init(&self) {
        if !self.try_init() {
            tracing::debug!("Logging was already initialized");
        }
    }
}

/// Initialize logging from the process environment
pub fn init_default() {
    LoggingConfig::from_env(|key| std::env::var(key).ok()).init();
}
