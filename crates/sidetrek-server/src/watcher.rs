//! Models directory watcher
//!
//! Watches the dbt models directory recursively with `notify` and turns each
//! change into one rebuild-and-push cycle. With a non-zero debounce window,
//! bursts of events (editors often write several times per save) are
//! coalesced by `notify-debouncer-mini` into a single batch.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐     ┌──────────┐
//! │   notify    │────>│  debouncer  │────>│ GraphBuilder │────>│ push_tx  │
//! │   watcher   │     │ (optional)  │     │   build()    │     │ (socket) │
//! └─────────────┘     └─────────────┘     └──────────────┘     └──────────┘
//! ```
//!
//! Batches are handled one at a time, so rebuilds for one session never
//! overlap and pushes leave in event order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use sidetrek_core::WatcherSettings;
use sidetrek_dbt::{model_names_from_paths, GraphBuilder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::Envelope;

/// Watcher options
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Coalescing window (zero = one batch per raw event)
    pub debounce: Duration,
    /// `dbt run --select` the models whose .sql files changed
    pub run_changed_models: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from(&WatcherSettings::default())
    }
}

impl From<&WatcherSettings> for WatchOptions {
    fn from(settings: &WatcherSettings) -> Self {
        Self {
            debounce: settings.debounce(),
            run_changed_models: settings.run_changed_models,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Models directory {0} does not exist")]
    MissingRoot(String),

    #[error("Failed to watch {path}: {source}")]
    Notify {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// Paths touched by one raw event or one debounce window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Event kind as reported by notify (`"debounced"` for coalesced batches)
    pub kind: String,
    pub paths: Vec<PathBuf>,
}

impl ChangeBatch {
    fn describe(&self) -> String {
        let paths: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
        format!("{} in {}", self.kind, paths.join(", "))
    }
}

/// Keeps the OS-level watch registered
enum Backend {
    Raw(RecommendedWatcher),
    Debounced(Debouncer<RecommendedWatcher>),
}

/// A running watch over one models directory.
///
/// Dropping it unregisters the watch and stops the rebuild task.
pub struct ModelWatcher {
    root: PathBuf,
    _backend: Backend,
    pump: JoinHandle<()>,
}

impl ModelWatcher {
    /// Start watching `root`; rebuilt graphs are sent to `push_tx`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        root: &Path,
        options: &WatchOptions,
        builder: Arc<GraphBuilder>,
        push_tx: mpsc::Sender<Envelope>,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::MissingRoot(root.display().to_string()));
        }

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let backend = watch(root, options.debounce, changes_tx).map_err(|source| {
            WatchError::Notify {
                path: root.display().to_string(),
                source,
            }
        })?;

        let pump = tokio::spawn(pump(
            changes_rx,
            builder,
            push_tx,
            options.run_changed_models,
        ));

        tracing::info!(
            root = %root.display(),
            debounce_ms = options.debounce.as_millis() as u64,
            "watching models directory"
        );

        Ok(Self {
            root: root.to_path_buf(),
            _backend: backend,
            pump,
        })
    }
}

impl Drop for ModelWatcher {
    fn drop(&mut self) {
        self.pump.abort();
        tracing::debug!(root = %self.root.display(), "stopped watching models directory");
    }
}

fn watch(
    root: &Path,
    debounce: Duration,
    changes_tx: mpsc::UnboundedSender<ChangeBatch>,
) -> notify::Result<Backend> {
    if debounce.is_zero() {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let _ = changes_tx.send(ChangeBatch {
                        kind: format!("{:?}", event.kind),
                        paths: event.paths,
                    });
                }
                Err(e) => tracing::error!("Watcher error: {:?}", e),
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        return Ok(Backend::Raw(watcher));
    }

    let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
        Ok(events) => {
            if events.is_empty() {
                return;
            }
            let _ = changes_tx.send(ChangeBatch {
                kind: "debounced".to_string(),
                paths: events.into_iter().map(|event| event.path).collect(),
            });
        }
        Err(e) => tracing::error!("Watcher error: {:?}", e),
    })?;
    debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
    Ok(Backend::Debounced(debouncer))
}

/// Rebuild and push once per batch until the session goes away
async fn pump(
    mut changes: mpsc::UnboundedReceiver<ChangeBatch>,
    builder: Arc<GraphBuilder>,
    push_tx: mpsc::Sender<Envelope>,
    run_changed_models: bool,
) {
    while let Some(batch) = changes.recv().await {
        tracing::info!("Detected {}", batch.describe());

        match builder.build().await {
            Ok(graph) => match Envelope::dag(&graph) {
                Ok(envelope) => {
                    if push_tx.send(envelope).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to encode lineage graph"),
            },
            Err(e) => tracing::warn!(error = %e, "skipping dag push"),
        }

        if run_changed_models {
            let models = model_names_from_paths(&batch.paths);
            if let Err(e) = builder.runner().run_models(&models).await {
                tracing::warn!(error = %e, "dbt run for changed models failed");
            }
        }
    }
}
