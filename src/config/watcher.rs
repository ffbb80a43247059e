//! Overrides file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::overrides::{load_overrides, Override};

/// A watcher that monitors the overrides file for changes.
pub struct OverridesWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Vec<Override>>,
}

impl OverridesWatcher {
    /// Create a new OverridesWatcher.
    ///
    /// Returns the watcher and a receiver for parsed override sets.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Vec<Override>>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Overrides file change detected, reloading...");
                        match load_overrides(&path) {
                            Ok(overrides) => {
                                let _ = tx.send(overrides);
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Failed to load overrides: {}. Keeping current configuration.",
                                    e
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Overrides watcher started");
        Ok(watcher)
    }
}
