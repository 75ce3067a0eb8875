//! Options file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::services::options::FileOptions;

/// A watcher that reloads the options snapshot when its file changes.
pub struct OptionsWatcher {
    path: PathBuf,
    options: Arc<FileOptions>,
}

impl OptionsWatcher {
    /// Create a new OptionsWatcher for the given file and store.
    pub fn new(path: &Path, options: Arc<FileOptions>) -> Self {
        Self {
            path: path.to_path_buf(),
            options,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to be delivered.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let options = self.options.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Options file change detected, reloading...");
                        if let Err(e) = options.reload() {
                            tracing::error!(error = %e, "Failed to reload options. Keeping current snapshot.");
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Options watcher started");
        Ok(watcher)
    }
}
