//! Incremental sync driven by a stream of watch signals

use super::{map_join_error, SyncEngine};
use crate::config::SyncConfig;
use crate::executor::Transfer;
use crate::resolver::{self, PatternSet};
use crate::types::{AssetError, ChangeKind, FileChange, WatchSignal, WatchState};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch as state_channel};
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Counters for a watch session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Live events received after the watcher was ready
    pub events: usize,
    /// Add/change events copied
    pub copied: usize,
    /// Unlink events applied (including already-absent destinations)
    pub deleted: usize,
    /// Events for paths outside the pattern set or inside the destination
    pub skipped: usize,
    /// Events whose copy or delete failed
    pub failed: usize,
}

/// Result of applying one watch event
#[derive(Debug)]
pub enum WatchOutcome {
    Copied {
        source: PathBuf,
        destination: PathBuf,
        bytes: u64,
    },
    Deleted {
        source: PathBuf,
        destination: PathBuf,
        existed: bool,
    },
    Failed {
        change: FileChange,
        error: AssetError,
    },
}

/// Optional callback used to receive watch outcomes.
pub type WatchCallback<'a> = dyn Fn(&WatchOutcome) + Send + Sync + 'a;

impl SyncEngine {
    /// Apply watch signals until `stop` resolves or the signal stream closes.
    ///
    /// Events that arrive before `WatchSignal::Ready` are dropped. Add and
    /// change copy the file; unlink removes its mapped destination. An added
    /// directory copies every matching file below it; an unlinked directory
    /// removes the matching copies below its mapped destination and prunes
    /// what is left empty. A failing event is logged and reported, and the
    /// loop keeps going. On exit the
    /// state becomes `Stopped`, no further events are read, and in-flight
    /// operations are awaited before returning.
    ///
    /// # Errors
    /// * `AssetError::Pattern` - the configured patterns do not compile
    pub async fn watch<S>(
        &self,
        mut signals: mpsc::UnboundedReceiver<WatchSignal>,
        stop: S,
        on_event: Option<&WatchCallback<'_>>,
    ) -> Result<WatchStats, AssetError>
    where
        S: Future<Output = ()>,
    {
        let patterns = Arc::new(resolver::compile(&self.config)?);
        self.set_state(WatchState::Initializing);

        let mut stats = WatchStats::default();
        let mut tasks: JoinSet<Vec<WatchOutcome>> = JoinSet::new();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    tracing::info!("stop requested");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    record_outcomes(joined, &mut stats, on_event);
                }
                signal = signals.recv() => match signal {
                    None => {
                        tracing::info!("watch stream closed");
                        break;
                    }
                    Some(WatchSignal::Ready) => {
                        self.set_state(WatchState::Ready);
                        tracing::info!("watching for changes");
                    }
                    Some(WatchSignal::Event(change)) => {
                        match self.current_state() {
                            WatchState::Initializing => {
                                tracing::debug!(
                                    kind = %change.kind,
                                    "dropping event received before ready: {}",
                                    change.path.display()
                                );
                                continue;
                            }
                            WatchState::Ready => self.set_state(WatchState::Active),
                            _ => {}
                        }

                        stats.events += 1;
                        tracing::debug!("watch asset: {} event: {}", change.path.display(), change.kind);
                        if !should_sync(&self.config, &patterns, &change) {
                            stats.skipped += 1;
                            tracing::debug!("skipping {}", change.path.display());
                            continue;
                        }

                        let config = Arc::clone(&self.config);
                        let transfer = Arc::clone(&self.transfer);
                        let patterns = Arc::clone(&patterns);
                        tasks.spawn_blocking(move || {
                            apply_change(&config, &patterns, transfer.as_ref(), change)
                        });
                    }
                }
            }
        }

        self.set_state(WatchState::Stopped);
        while let Some(joined) = tasks.join_next().await {
            record_outcomes(joined, &mut stats, on_event);
        }

        tracing::info!(
            events = stats.events,
            copied = stats.copied,
            deleted = stats.deleted,
            failed = stats.failed,
            "watch stopped"
        );
        Ok(stats)
    }

    /// Run [`SyncEngine::watch`] on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_watch(
        self: Arc<Self>,
        signals: mpsc::UnboundedReceiver<WatchSignal>,
        on_event: Option<Arc<WatchCallback<'static>>>,
    ) -> WatchHandle {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let state = self.state();
        let task = tokio::spawn(async move {
            let stop = async {
                let _ = stop_rx.await;
            };
            self.watch(signals, stop, on_event.as_deref()).await
        });

        WatchHandle {
            stop_tx: Some(stop_tx),
            state,
            task,
        }
    }
}

/// Handle to a watch loop running on a background task
///
/// Dropping the handle also requests a stop.
pub struct WatchHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    state: state_channel::Receiver<WatchState>,
    task: JoinHandle<Result<WatchStats, AssetError>>,
}

impl WatchHandle {
    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// Wait until the loop has reached `target` or any later state.
    pub async fn wait_for(&mut self, target: WatchState) -> WatchState {
        let rank = |s: &WatchState| match s {
            WatchState::Initializing => 0,
            WatchState::Ready => 1,
            WatchState::Active => 2,
            WatchState::Stopped => 3,
        };
        let wanted = rank(&target);
        match self.state.wait_for(|s| rank(s) >= wanted).await {
            Ok(state) => *state,
            Err(_) => WatchState::Stopped,
        }
    }

    /// Request a stop, drain in-flight operations and return the session stats.
    pub async fn stop(mut self) -> Result<WatchStats, AssetError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        (&mut self.task).await.map_err(map_join_error)?
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

fn should_sync(config: &SyncConfig, patterns: &PatternSet, change: &FileChange) -> bool {
    if config.is_in_destination(&change.path) {
        return false;
    }
    patterns.matches_path(&change.path) || is_directory_change(config, change)
}

/// A directory appeared in the source tree, or one whose copies exist in the
/// destination went away.
fn is_directory_change(config: &SyncConfig, change: &FileChange) -> bool {
    match change.kind {
        ChangeKind::Add => change.path.is_dir(),
        ChangeKind::Change => false,
        ChangeKind::Unlink => config
            .map_path(&change.path)
            .is_ok_and(|destination| destination.is_dir()),
    }
}

fn apply_change(
    config: &SyncConfig,
    patterns: &PatternSet,
    transfer: &dyn Transfer,
    change: FileChange,
) -> Vec<WatchOutcome> {
    let destination = match config.map_path(&change.path) {
        Ok(destination) => destination,
        Err(error) => return vec![WatchOutcome::Failed { change, error }],
    };

    match change.kind {
        ChangeKind::Add if change.path.is_dir() => copy_directory(config, patterns, transfer, change),
        ChangeKind::Unlink if destination.is_dir() => {
            remove_directory(config, patterns, transfer, change, &destination)
        }
        _ => vec![apply_file_change(transfer, change, destination)],
    }
}

fn apply_file_change(transfer: &dyn Transfer, change: FileChange, destination: PathBuf) -> WatchOutcome {
    match change.kind {
        ChangeKind::Add | ChangeKind::Change => match transfer.copy(&change.path, &destination) {
            Ok(bytes) => WatchOutcome::Copied {
                source: change.path,
                destination,
                bytes,
            },
            Err(error) => WatchOutcome::Failed { change, error },
        },
        ChangeKind::Unlink => match transfer.remove(&destination) {
            Ok(existed) => WatchOutcome::Deleted {
                source: change.path,
                destination,
                existed,
            },
            Err(error) => WatchOutcome::Failed { change, error },
        },
    }
}

/// Copy every matching file below a directory that appeared in one step.
fn copy_directory(
    config: &SyncConfig,
    patterns: &PatternSet,
    transfer: &dyn Transfer,
    change: FileChange,
) -> Vec<WatchOutcome> {
    let sources = match resolver::resolve_dir(patterns, &change.path, Some(config.destination_root())) {
        Ok(sources) => sources,
        Err(error) => return vec![WatchOutcome::Failed { change, error }],
    };
    tracing::debug!(files = sources.len(), "expanding directory {}", change.path.display());

    sources
        .into_iter()
        .map(|source| {
            let file = FileChange::new(ChangeKind::Add, source);
            match config.map_path(&file.path) {
                Ok(destination) => apply_file_change(transfer, file, destination),
                Err(error) => WatchOutcome::Failed { change: file, error },
            }
        })
        .collect()
}

/// Remove the copies of a source directory that went away, then any
/// directories left empty.
fn remove_directory(
    config: &SyncConfig,
    patterns: &PatternSet,
    transfer: &dyn Transfer,
    change: FileChange,
    destination: &Path,
) -> Vec<WatchOutcome> {
    let copies = match resolver::mirrored_files(patterns, config.destination_root(), destination) {
        Ok(copies) => copies,
        Err(error) => return vec![WatchOutcome::Failed { change, error }],
    };
    tracing::debug!(files = copies.len(), "removing copies under {}", destination.display());

    let mut outcomes: Vec<WatchOutcome> = copies
        .into_iter()
        .map(|copy| {
            let source = match copy.strip_prefix(config.destination_root()) {
                Ok(relative) => config.input_root().join(relative),
                Err(_) => change.path.clone(),
            };
            apply_file_change(transfer, FileChange::new(ChangeKind::Unlink, source), copy)
        })
        .collect();

    if let Err(error) = transfer.prune(destination) {
        outcomes.push(WatchOutcome::Failed { change, error });
    }
    outcomes
}

fn record_outcomes(
    joined: Result<Vec<WatchOutcome>, JoinError>,
    stats: &mut WatchStats,
    on_event: Option<&WatchCallback<'_>>,
) {
    let outcomes = match joined {
        Ok(outcomes) => outcomes,
        Err(e) => {
            stats.failed += 1;
            tracing::error!("watch task failed: {}", e);
            return;
        }
    };

    for outcome in outcomes {
        record_outcome(&outcome, stats);
        if let Some(callback) = on_event {
            callback(&outcome);
        }
    }
}

fn record_outcome(outcome: &WatchOutcome, stats: &mut WatchStats) {
    match outcome {
        WatchOutcome::Copied {
            source,
            destination,
            ..
        } => {
            stats.copied += 1;
            tracing::debug!("copied {} -> {}", source.display(), destination.display());
        }
        WatchOutcome::Deleted { destination, .. } => {
            stats.deleted += 1;
            tracing::debug!("removed {}", destination.display());
        }
        WatchOutcome::Failed { change, error } => {
            stats.failed += 1;
            tracing::warn!("{} {} failed: {}", change.kind, change.path.display(), error);
        }
    }
}
