//! Logging setup
//!
//! The crate only emits `tracing` events. Nothing is installed implicitly:
//! applications call [`init`] once at startup, tests use [`scoped`] to get a
//! subscriber that lives as long as the returned guard.

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Logging verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Logging disabled
    None,
    #[default]
    Error,
    Info,
    Debug,
    /// Extra verbose, includes the frame I/O path
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::None => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    /// `EnvFilter` directives overriding `level`, e.g. "audio_peer_session::engine=trace"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Colored output
    pub ansi: bool,
}

impl LogConfig {
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        match &self.filter {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|e| Error::Config(format!("invalid log filter {directives:?}: {e}"))),
            None => Ok(EnvFilter::default().add_directive(LevelFilter::from(self.level).into())),
        }
    }
}

/// Install the process-wide subscriber
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LogConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(tracing_subscriber::fmt::layer().with_ansi(config.ansi))
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}

/// Install a subscriber for the current thread until the guard drops
pub fn scoped(config: &LogConfig) -> Result<DefaultGuard> {
    let subscriber = tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(config.ansi)
                .with_test_writer(),
        );
    Ok(tracing::subscriber::set_default(subscriber))
}
