//! Resolve-once configuration cell.
//!
//! Page mods start before the configuration file has been read. They see the
//! default config until [`ConfigCell::publish`] fires, and can await
//! [`ConfigCell::wait_loaded`] when they need the real values.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ConfigError;

#[derive(Clone)]
pub struct ConfigCell {
    tx: Arc<watch::Sender<Option<Arc<Config>>>>,
}

impl Default for ConfigCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// A cell that is already resolved.
    pub fn loaded(config: Config) -> Self {
        let cell = Self::new();
        cell.publish(config);
        cell
    }

    /// Resolve the cell. Only the first call has an effect; returns whether it did.
    pub fn publish(&self, config: Config) -> bool {
        let config = Arc::new(config);
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(config);
            true
        })
    }

    /// Current config, or the defaults while still unresolved.
    pub fn current(&self) -> Arc<Config> {
        self.tx
            .borrow()
            .clone()
            .unwrap_or_else(|| Arc::new(Config::default()))
    }

    pub fn is_loaded(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until the cell is resolved.
    pub async fn wait_loaded(&self) -> Arc<Config> {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot observe a close.
        if let Ok(value) = rx.wait_for(Option::is_some).await {
            if let Some(config) = value.as_ref() {
                return config.clone();
            }
        }
        self.current()
    }

    /// Read `path` and publish the result. A missing or malformed file
    /// publishes the defaults so waiters are never left hanging.
    pub async fn load_into(&self, path: &Path) -> Result<Arc<Config>, ConfigError> {
        let result = load_config(path).await;
        let config = match &result {
            Ok(config) => config.clone(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config load failed, using defaults");
                Config::default()
            }
        };
        if !self.publish(config) {
            warn!(path = %path.display(), "config already published, ignoring reload");
        }
        result.map(|_| self.current())
    }
}

/// Read and parse a config file without blocking the runtime.
pub async fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let config = Config::from_yaml_str(&text)?;
    for problem in config.validate() {
        warn!(path = %path.display(), "config: {problem}");
    }
    info!(
        path = %path.display(),
        alert_buttons = config.alert_buttons.len(),
        static_links = config.static_links.len(),
        "config loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_until_published() {
        let cell = ConfigCell::new();
        assert!(!cell.is_loaded());
        assert_eq!(*cell.current(), Config::default());

        let config = Config {
            separator_text: Some("Ops".into()),
            ..Config::default()
        };
        assert!(cell.publish(config.clone()));
        assert!(cell.is_loaded());
        assert_eq!(*cell.current(), config);
    }

    #[test]
    fn only_first_publish_wins() {
        let cell = ConfigCell::loaded(Config {
            separator_text: Some("first".into()),
            ..Config::default()
        });
        assert!(!cell.publish(Config {
            separator_text: Some("second".into()),
            ..Config::default()
        }));
        assert_eq!(cell.current().separator_text.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn waiters_wake_on_publish() {
        let cell = ConfigCell::new();
        let waiter = {
            let cell = cell.clone();
            tokio::spawn(async move { cell.wait_loaded().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        cell.publish(Config {
            separator_text: Some("Ops".into()),
            ..Config::default()
        });
        let config = waiter.await.unwrap();
        assert_eq!(config.separator_text.as_deref(), Some("Ops"));
    }

    #[tokio::test]
    async fn missing_file_publishes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cell = ConfigCell::new();
        let result = cell.load_into(&dir.path().join("config.yaml")).await;
        assert!(matches!(result, Err(ConfigError::Io { .. })));
        assert!(cell.is_loaded());
        assert_eq!(*cell.wait_loaded().await, Config::default());
    }

    #[tokio::test]
    async fn loads_file_into_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "separator_text: Links\n").unwrap();

        let cell = ConfigCell::new();
        let config = cell.load_into(&path).await.unwrap();
        assert_eq!(config.separator_text.as_deref(), Some("Links"));
    }
}
