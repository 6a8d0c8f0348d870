//! Sync engine: one-shot full copy and event-driven incremental sync
//!
//! The engine holds the only shared state between per-file operations: the
//! read-only [`SyncConfig`] and the [`Transfer`] collaborator. Every copy or
//! delete runs on tokio's blocking pool; distinct files never coordinate.

mod watch;

pub use watch::{WatchCallback, WatchHandle, WatchOutcome, WatchStats};

use crate::config::SyncConfig;
use crate::executor::{FsTransfer, Transfer};
use crate::resolver;
use crate::types::{clone_error, AssetError, WatchState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch as state_channel;
use tokio::task::{JoinError, JoinSet};

/// Counters for a full sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Files matched by the patterns
    pub total: usize,
    /// Files copied successfully
    pub copied: usize,
    /// Files that failed to map or copy
    pub failed: usize,
    /// Aggregate copied bytes
    pub bytes_copied: u64,
}

/// Events emitted during a full sync
#[derive(Debug)]
pub enum SyncEvent {
    /// Destination prepared and sources resolved.
    Started { total: usize },
    /// One file copied.
    FileCopied {
        source: PathBuf,
        destination: PathBuf,
        bytes: u64,
    },
    /// One file failed; the run continues.
    FileError { source: PathBuf, error: AssetError },
    /// All copies attempted (with or without errors).
    Complete { stats: SyncStats },
}

/// Optional callback used to receive full sync events.
pub type SyncCallback<'a> = dyn Fn(&SyncEvent) + Send + Sync + 'a;

type CopyResult = (PathBuf, Result<(PathBuf, u64), AssetError>);

/// Drives full and incremental synchronization for one [`SyncConfig`]
pub struct SyncEngine {
    config: Arc<SyncConfig>,
    transfer: Arc<dyn Transfer>,
    state: state_channel::Sender<WatchState>,
}

impl SyncEngine {
    /// Engine backed by the local filesystem
    pub fn new(config: SyncConfig) -> Self {
        Self::with_transfer(config, Arc::new(FsTransfer))
    }

    /// Engine with a custom copy/delete collaborator
    pub fn with_transfer(config: SyncConfig, transfer: Arc<dyn Transfer>) -> Self {
        let (state, _) = state_channel::channel(WatchState::Initializing);
        Self {
            config: Arc::new(config),
            transfer,
            state,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Subscribe to watch-loop state transitions
    pub fn state(&self) -> state_channel::Receiver<WatchState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, next: WatchState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(?previous, ?next, "watch state changed");
        }
    }

    pub fn current_state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// Copy every file matched by the configured patterns.
    ///
    /// 1. Compile patterns (malformed patterns fail before anything is touched)
    /// 2. Clear the destination root unless `preserve_existing`; this finishes
    ///    before the first copy starts
    /// 3. Resolve patterns against the input root
    /// 4. Copy files concurrently, at most `jobs` at a time
    ///
    /// Per-file failures do not stop the run. When any file failed, the
    /// result is `AssetError::Incomplete` after all copies were attempted.
    pub async fn run_full_sync(
        &self,
        on_event: Option<&SyncCallback<'_>>,
    ) -> Result<SyncStats, AssetError> {
        let patterns = resolver::compile(&self.config)?;

        if !self.config.preserve_existing() {
            let transfer = Arc::clone(&self.transfer);
            let root = self.config.destination_root().to_path_buf();
            tracing::info!("clearing {}", root.display());
            tokio::task::spawn_blocking(move || transfer.clear(&root))
                .await
                .map_err(map_join_error)??;
        }

        let skip = self.config.destination_root().to_path_buf();
        let files = tokio::task::spawn_blocking(move || resolver::resolve(&patterns, Some(&skip)))
            .await
            .map_err(map_join_error)??;

        let mut stats = SyncStats {
            total: files.len(),
            ..Default::default()
        };
        tracing::info!(
            files = stats.total,
            "copying into {}",
            self.config.destination_root().display()
        );
        emit_event(on_event, SyncEvent::Started { total: stats.total });

        let jobs = self.config.jobs();
        let mut errors: Vec<(PathBuf, AssetError)> = Vec::new();
        let mut tasks: JoinSet<CopyResult> = JoinSet::new();

        for source in files {
            while tasks.len() >= jobs {
                if let Some(joined) = tasks.join_next().await {
                    record_copy(joined, &mut stats, &mut errors, on_event);
                }
            }

            let config = Arc::clone(&self.config);
            let transfer = Arc::clone(&self.transfer);
            tasks.spawn_blocking(move || {
                let result = config.map_pair(&source).and_then(|pair| {
                    transfer
                        .copy(&pair.source, &pair.destination)
                        .map(|bytes| (pair.destination, bytes))
                });
                (source, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            record_copy(joined, &mut stats, &mut errors, on_event);
        }

        emit_event(
            on_event,
            SyncEvent::Complete {
                stats: stats.clone(),
            },
        );

        if errors.is_empty() {
            tracing::info!(
                copied = stats.copied,
                bytes = stats.bytes_copied,
                "full sync complete"
            );
            Ok(stats)
        } else {
            Err(AssetError::Incomplete {
                failed: errors.len(),
                total: stats.total,
                summary: build_error_summary(&errors),
            })
        }
    }
}

fn record_copy(
    joined: Result<CopyResult, JoinError>,
    stats: &mut SyncStats,
    errors: &mut Vec<(PathBuf, AssetError)>,
    on_event: Option<&SyncCallback<'_>>,
) {
    let (source, result) = match joined {
        Ok(done) => done,
        Err(e) => (PathBuf::new(), Err(map_join_error(e))),
    };

    match result {
        Ok((destination, bytes)) => {
            stats.copied += 1;
            stats.bytes_copied += bytes;
            tracing::debug!(
                "copied {} -> {}",
                source.display(),
                destination.display()
            );
            emit_event(
                on_event,
                SyncEvent::FileCopied {
                    source,
                    destination,
                    bytes,
                },
            );
        }
        Err(error) => {
            stats.failed += 1;
            tracing::warn!("failed to copy {}: {}", source.display(), error);
            emit_event(
                on_event,
                SyncEvent::FileError {
                    source: source.clone(),
                    error: clone_error(&error),
                },
            );
            errors.push((source, error));
        }
    }
}

fn emit_event(on_event: Option<&SyncCallback<'_>>, event: SyncEvent) {
    if let Some(callback) = on_event {
        callback(&event);
    }
}

pub(crate) fn map_join_error(error: JoinError) -> AssetError {
    AssetError::Io(std::io::Error::other(format!(
        "file operation task failed: {}",
        error
    )))
}

fn build_error_summary(errors: &[(PathBuf, AssetError)]) -> String {
    let preview = errors
        .iter()
        .take(3)
        .map(|(path, err)| format!("{}: {}", path.display(), err))
        .collect::<Vec<_>>()
        .join("; ");

    format!("Example failures: {}", preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncOptions;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn config_for(input: &Path, output: &Path, patterns: &[&str]) -> SyncConfig {
        SyncConfig::try_from(SyncOptions {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            input: Some(input.to_path_buf()),
            output: Some(output.to_path_buf()),
            jobs: Some(2),
            ..SyncOptions::default()
        })
        .expect("valid config")
    }

    /// Fails every copy whose source name contains "bad".
    struct FlakyTransfer;

    impl Transfer for FlakyTransfer {
        fn copy(&self, src: &Path, dest: &Path) -> Result<u64, AssetError> {
            let name = src.file_name().map(|n| n.to_string_lossy().into_owned());
            if name.is_some_and(|n| n.contains("bad")) {
                return Err(AssetError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                )));
            }
            FsTransfer.copy(src, dest)
        }

        fn remove(&self, path: &Path) -> Result<bool, AssetError> {
            FsTransfer.remove(path)
        }

        fn clear(&self, root: &Path) -> Result<(), AssetError> {
            FsTransfer.clear(root)
        }
    }

    #[tokio::test]
    async fn test_full_sync_copies_nested_tree() {
        let input = TempDir::new().expect("create input");
        let output = TempDir::new().expect("create output");
        fs::create_dir_all(input.path().join("log")).expect("create log dir");
        fs::write(input.path().join("root.txt"), b"root").expect("write root");
        fs::write(input.path().join("log/example.txt"), b"example").expect("write nested");

        let engine = SyncEngine::new(config_for(input.path(), output.path(), &["**/*"]));
        let stats = engine.run_full_sync(None).await.expect("full sync");

        assert_eq!(stats.total, 2);
        assert_eq!(stats.copied, 2);
        assert_eq!(stats.bytes_copied, 11);
        assert_eq!(
            fs::read(output.path().join("log/example.txt")).expect("read nested"),
            b"example"
        );
    }

    #[tokio::test]
    async fn test_full_sync_aggregates_failures_and_continues() {
        let input = TempDir::new().expect("create input");
        let output = TempDir::new().expect("create output");
        for name in ["a.txt", "bad.txt", "c.txt", "d.txt"] {
            fs::write(input.path().join(name), name).expect("write source");
        }

        let engine = SyncEngine::with_transfer(
            config_for(input.path(), output.path(), &["*.txt"]),
            Arc::new(FlakyTransfer),
        );
        let err = engine
            .run_full_sync(None)
            .await
            .expect_err("one failure must fail the run");

        match err {
            AssetError::Incomplete { failed, total, summary } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 4);
                assert!(summary.contains("bad.txt"));
            }
            other => panic!("expected incomplete, got {other:?}"),
        }
        for name in ["a.txt", "c.txt", "d.txt"] {
            assert!(output.path().join(name).exists(), "{name} should be copied");
        }
        assert!(!output.path().join("bad.txt").exists());
    }

    #[tokio::test]
    async fn test_full_sync_emits_events_in_order() {
        let input = TempDir::new().expect("create input");
        let output = TempDir::new().expect("create output");
        fs::write(input.path().join("a.txt"), b"a").expect("write a");
        fs::write(input.path().join("bad.txt"), b"b").expect("write bad");

        let labels: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let labels_ref = Arc::clone(&labels);
        let callback = move |event: &SyncEvent| {
            let label = match event {
                SyncEvent::Started { .. } => "start",
                SyncEvent::FileCopied { .. } => "copied",
                SyncEvent::FileError { .. } => "error",
                SyncEvent::Complete { .. } => "complete",
            };
            labels_ref.lock().expect("lock labels").push(label);
        };

        let engine = SyncEngine::with_transfer(
            config_for(input.path(), output.path(), &["*.txt"]),
            Arc::new(FlakyTransfer),
        );
        let _ = engine.run_full_sync(Some(&callback)).await;

        let snapshot = labels.lock().expect("lock labels").clone();
        assert_eq!(snapshot.first(), Some(&"start"));
        assert_eq!(snapshot.last(), Some(&"complete"));
        assert!(snapshot.contains(&"copied"));
        assert!(snapshot.contains(&"error"));
        assert_eq!(snapshot.len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_pattern_leaves_destination_untouched() {
        let input = TempDir::new().expect("create input");
        let output = TempDir::new().expect("create output");
        fs::write(output.path().join("keep.txt"), b"keep").expect("write existing");

        let engine = SyncEngine::new(config_for(input.path(), output.path(), &["log/[abc"]));
        let err = engine
            .run_full_sync(None)
            .await
            .expect_err("malformed pattern must fail");

        assert!(matches!(err, AssetError::Pattern { .. }));
        assert!(output.path().join("keep.txt").exists());
    }

    #[test]
    fn test_build_error_summary_previews_three() {
        let errors: Vec<(PathBuf, AssetError)> = (0..5)
            .map(|i| {
                (
                    PathBuf::from(format!("f{i}.txt")),
                    AssetError::Config("x".to_string()),
                )
            })
            .collect();
        let summary = build_error_summary(&errors);
        assert!(summary.contains("f0.txt"));
        assert!(summary.contains("f2.txt"));
        assert!(!summary.contains("f3.txt"));
    }
}
