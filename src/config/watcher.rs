//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by renaming a temporary file over the original are still seen.
//! Only configurations that load, validate and differ from the last applied
//! one are forwarded.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

/// Stream of reloaded configurations. Watching stops when this is dropped.
pub struct ConfigUpdates {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<AppConfig>,
}

impl ConfigUpdates {
    /// Next changed, valid configuration.
    pub async fn recv(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

pub struct ConfigWatcher;

impl ConfigWatcher {
    /// Watch `path`, starting from the already-applied `current` config.
    pub fn spawn(path: &Path, current: AppConfig) -> Result<ConfigUpdates, notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let file = path.to_path_buf();
        let name = file.file_name().map(OsString::from);
        let mut last = current;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                if !event.paths.iter().any(|p| p.file_name() == name.as_deref()) {
                    return;
                }
                if let Some(config) = reload(&file, &mut last) {
                    let _ = tx.send(config);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watch_root(path), RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "Watching config file for changes");

        Ok(ConfigUpdates {
            _watcher: watcher,
            rx,
        })
    }
}

fn watch_root(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load `path` and return it if it is valid and differs from `last`.
fn reload(path: &Path, last: &mut AppConfig) -> Option<AppConfig> {
    match load_config(path) {
        Ok(config) if config == *last => {
            tracing::debug!(path = %path.display(), "Config file touched without changes");
            None
        }
        Ok(config) => {
            tracing::info!(path = %path.display(), "Config file changed, applying");
            *last = config.clone();
            Some(config)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            None
        }
    }
}
