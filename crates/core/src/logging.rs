//! `tracing` subscriber setup.
//!
//! The level is known only after the configuration has loaded, so the
//! filter sits behind a reload layer and [`LogHandle::set_level`] swaps it.
//! An explicit `RUST_LOG` always wins over the configured level.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt as fmt_layer, reload, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::new(self.as_str())
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Handle to the installed filter.
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl LogHandle {
    /// Apply the configured level (ignored when `RUST_LOG` is set).
    pub fn set_level(&self, level: LogLevel) {
        if self.env_override {
            tracing::debug!(%level, "RUST_LOG is set, keeping environment filter");
            return;
        }
        if let Err(e) = self.handle.modify(|filter| *filter = level.filter()) {
            tracing::warn!(%level, error = %e, "failed to update log level");
        } else {
            tracing::info!(%level, "log level updated from config");
        }
    }
}

/// Install the global subscriber. Returns a handle for later level changes.
///
/// A second call (e.g. from tests) leaves the first subscriber in place.
pub fn init_tracing(default_level: LogLevel) -> LogHandle {
    let (filter, env_override) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (default_level.filter(), false),
    };
    let (filter_layer, handle) = reload::Layer::new(filter);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer::layer().with_target(false))
        .try_init();

    LogHandle {
        handle,
        env_override,
    }
}
