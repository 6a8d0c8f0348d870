//! Main copy/watch command

use crate::config::SyncConfig;
use crate::engine::{SyncEngine, SyncEvent, WatchOutcome};
use crate::resolver;
use crate::types::AssetError;
use crate::ui::{ProgressReporter, WatchReporter};
use crate::watcher::FsWatcher;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Output options that do not affect sync semantics
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub quiet: bool,
}

/// Run the configured copy and/or watch to completion.
///
/// Watch mode returns after Ctrl-C. In copy-then-watch mode the watcher is
/// subscribed before the initial copy starts, so changes made while copying
/// are applied afterwards. A failed initial copy is reported, the watch still
/// runs, and the copy failure is returned once the watch ends.
pub fn run(config: SyncConfig, options: RunOptions) -> Result<(), AssetError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AssetError::Io)?;
    let engine = Arc::new(SyncEngine::new(config));
    runtime.block_on(run_engine(engine, options, ctrl_c()))
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Drive `engine` in its configured mode; a watch ends when `stop` resolves.
async fn run_engine<S>(engine: Arc<SyncEngine>, options: RunOptions, stop: S) -> Result<(), AssetError>
where
    S: Future<Output = ()>,
{
    let mode = engine.config().mode();
    if !mode.watches() {
        return full_sync(&engine, options).await;
    }

    let patterns = resolver::compile(engine.config())?;
    let (watcher, signals) = FsWatcher::subscribe(&patterns.watch_roots())?;

    let mut copy_result = Ok(());
    if mode.copies_first() {
        copy_result = full_sync(&engine, options).await;
        if let Err(e) = &copy_result {
            if e.is_fatal() {
                return copy_result;
            }
            tracing::warn!("initial copy incomplete, watching anyway");
        }
    }

    let reporter = WatchReporter::new(options.quiet);
    let on_event = |outcome: &WatchOutcome| reporter.report(outcome);
    let stats = engine.watch(signals, stop, Some(&on_event)).await?;
    drop(watcher);
    tracing::info!(
        copied = stats.copied,
        deleted = stats.deleted,
        failed = stats.failed,
        "watch session ended"
    );
    copy_result
}

async fn full_sync(engine: &SyncEngine, options: RunOptions) -> Result<(), AssetError> {
    let reporter = if options.quiet {
        ProgressReporter::hidden()
    } else {
        ProgressReporter::new()
    };
    let error_records: Mutex<Vec<ErrorRecord>> = Mutex::new(Vec::new());
    let on_event = |event: &SyncEvent| {
        reporter.handle(event);
        if let SyncEvent::FileError { source, error } = event {
            if let Ok(mut records) = error_records.lock() {
                records.push(ErrorRecord::new(Some(source), error));
            }
        }
    };

    let result = engine.run_full_sync(Some(&on_event)).await;
    if let Ok(records) = error_records.lock() {
        if !records.is_empty() {
            eprintln!("{}", format_error_summary(&records));
        }
    }
    result.map(|_| ())
}

#[derive(Debug)]
struct ErrorRecord {
    kind: &'static str,
    path: Option<PathBuf>,
    message: String,
    suggestion: Option<String>,
}

impl ErrorRecord {
    fn new(path: Option<&Path>, error: &AssetError) -> Self {
        let (message, suggestion) = humanize_error(error);
        Self {
            kind: error_kind_label(error),
            path: path.map(PathBuf::from),
            message,
            suggestion,
        }
    }
}

fn humanize_error(error: &AssetError) -> (String, Option<String>) {
    match error {
        AssetError::Io(io) => match io.kind() {
            ErrorKind::NotFound => (
                "Source file disappeared before it could be copied".to_string(),
                Some("Verify the file still exists and retry.".to_string()),
            ),
            ErrorKind::PermissionDenied => (
                "Permission denied while accessing file".to_string(),
                Some("Check file permissions or run with a user that has access.".to_string()),
            ),
            ErrorKind::AlreadyExists => (
                "The destination path already exists as a directory".to_string(),
                Some("Remove or rename the conflicting path, then retry.".to_string()),
            ),
            _ => (
                format!("I/O operation failed: {}", io),
                Some("Retry. If this keeps happening, check disk health and permissions.".to_string()),
            ),
        },
        AssetError::PathInvariant { root, .. } => (
            format!("File is not under the input directory {}", root.display()),
            Some("Pass an --input directory that contains every matched file.".to_string()),
        ),
        AssetError::Config(msg) | AssetError::Watch(msg) => (msg.clone(), None),
        AssetError::Pattern { pattern, message } => {
            (format!("Pattern '{}' is invalid: {}", pattern, message), None)
        }
        AssetError::Manifest { path, message } => {
            (format!("{}: {}", path.display(), message), None)
        }
        AssetError::Incomplete { summary, .. } => (summary.clone(), None),
    }
}

fn error_kind_label(error: &AssetError) -> &'static str {
    match error {
        AssetError::Io(_) => "I/O error",
        AssetError::Config(_) => "Configuration error",
        AssetError::PathInvariant { .. } => "Outside input directory",
        AssetError::Pattern { .. } => "Pattern error",
        AssetError::Manifest { .. } => "Manifest error",
        AssetError::Watch(_) => "Watch error",
        AssetError::Incomplete { .. } => "Incomplete sync",
    }
}

fn format_error_summary(records: &[ErrorRecord]) -> String {
    let mut groups: BTreeMap<&'static str, Vec<&ErrorRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.kind).or_default().push(record);
    }

    let mut lines = Vec::new();
    lines.push("Error summary:".to_string());
    for (kind, items) in groups {
        lines.push(format!("  {} ({}):", kind, items.len()));
        for record in items.iter().take(3) {
            lines.push(format!("    - {}", record.message));
            if let Some(path) = &record.path {
                lines.push(format!("      Path: {}", path.display()));
            }
            if let Some(suggestion) = &record.suggestion {
                lines.push(format!("      Try: {}", suggestion));
            }
        }
        if items.len() > 3 {
            lines.push(format!("    - ... {} more", items.len() - 3));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SyncOptions, WatchMode};
    use crate::types::WatchState;
    use crate::executor::{FsTransfer, Transfer};
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);
    const QUIET: RunOptions = RunOptions { quiet: true };

    fn config_for(input: &Path, output: &Path, patterns: &[&str], mode: WatchMode) -> SyncConfig {
        SyncConfig::try_from(SyncOptions {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            input: Some(input.to_path_buf()),
            output: Some(output.to_path_buf()),
            mode,
            ..SyncOptions::default()
        })
        .expect("valid config")
    }

    /// Refuses to copy files named "bad.txt"; the first good copy also
    /// writes `late.txt` into the input root.
    struct ChurnTransfer {
        input: PathBuf,
    }

    impl Transfer for ChurnTransfer {
        fn copy(&self, src: &Path, dest: &Path) -> Result<u64, AssetError> {
            if src.ends_with("bad.txt") {
                return Err(AssetError::Io(std::io::Error::new(
                    ErrorKind::PermissionDenied,
                    "denied",
                )));
            }
            let late = self.input.join("late.txt");
            if !src.ends_with("late.txt") && !late.exists() {
                fs::write(&late, b"late").map_err(AssetError::Io)?;
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

    async fn wait_for_file(path: &Path) {
        let started = Instant::now();
        while !path.exists() {
            assert!(
                started.elapsed() < SETTLE_TIMEOUT,
                "timed out waiting for {}",
                path.display()
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn test_copy_only_mode_returns_after_copy() {
        let input = TempDir::new().expect("create input");
        let output = TempDir::new().expect("create output");
        fs::write(input.path().join("a.txt"), b"a").expect("write source");

        let engine = Arc::new(SyncEngine::new(config_for(
            input.path(),
            output.path(),
            &["*.txt"],
            WatchMode::Off,
        )));
        run_engine(Arc::clone(&engine), QUIET, std::future::pending())
            .await
            .expect("copy");

        assert!(output.path().join("a.txt").exists());
        assert_eq!(engine.current_state(), WatchState::Initializing);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_copy_then_watch_keeps_changes_made_during_copy() {
        let input = TempDir::new().expect("create input");
        let output = TempDir::new().expect("create output");
        fs::write(input.path().join("a.txt"), b"a").expect("write good source");
        fs::write(input.path().join("bad.txt"), b"bad").expect("write failing source");

        let config = config_for(input.path(), output.path(), &["*.txt"], WatchMode::CopyThenWatch);
        let transfer = ChurnTransfer {
            input: config.input_root().to_path_buf(),
        };
        let engine = Arc::new(SyncEngine::with_transfer(config, Arc::new(transfer)));

        let mut state = engine.state();
        let late_copy = output.path().join("late.txt");
        let stop = async move {
            state
                .wait_for(|s| *s != WatchState::Initializing)
                .await
                .expect("engine alive");
            wait_for_file(&late_copy).await;
        };

        let result = run_engine(Arc::clone(&engine), QUIET, stop).await;

        assert!(matches!(result, Err(AssetError::Incomplete { .. })));
        assert!(output.path().join("a.txt").exists());
        assert!(output.path().join("late.txt").exists());
        assert!(!output.path().join("bad.txt").exists());
        assert_eq!(engine.current_state(), WatchState::Stopped);
    }

    #[tokio::test]
    async fn test_invalid_pattern_in_watch_mode_fails_fast() {
        let input = TempDir::new().expect("create input");
        let output = TempDir::new().expect("create output");
        fs::write(output.path().join("existing.txt"), b"keep").expect("write existing");

        let engine = Arc::new(SyncEngine::new(config_for(
            input.path(),
            output.path(),
            &["src/["],
            WatchMode::CopyThenWatch,
        )));
        let result = tokio::time::timeout(
            SETTLE_TIMEOUT,
            run_engine(engine, QUIET, std::future::pending()),
        )
        .await
        .expect("returns without waiting for a stop");

        assert!(matches!(result, Err(AssetError::Pattern { .. })));
        assert!(output.path().join("existing.txt").exists());
    }

    #[test]
    fn test_format_error_summary_groups_by_kind() {
        let records = vec![
            ErrorRecord {
                kind: "I/O error",
                path: Some(PathBuf::from("a.txt")),
                message: "Permission denied while accessing file".to_string(),
                suggestion: Some(
                    "Check file permissions or run with a user that has access.".to_string(),
                ),
            },
            ErrorRecord {
                kind: "Outside input directory",
                path: Some(PathBuf::from("/elsewhere/b.txt")),
                message: "File is not under the input directory /in".to_string(),
                suggestion: None,
            },
            ErrorRecord {
                kind: "I/O error",
                path: Some(PathBuf::from("c.txt")),
                message: "Source file disappeared before it could be copied".to_string(),
                suggestion: None,
            },
        ];

        let summary = format_error_summary(&records);
        assert!(summary.contains("Error summary:"));
        assert!(summary.contains("I/O error (2):"));
        assert!(summary.contains("Outside input directory (1):"));
        assert!(summary.contains("Path: a.txt"));
        assert!(summary.contains("Try: Check file permissions"));
    }

    #[test]
    fn test_format_error_summary_truncates_long_groups() {
        let records: Vec<ErrorRecord> = (0..5)
            .map(|i| ErrorRecord {
                kind: "I/O error",
                path: Some(PathBuf::from(format!("f{i}.txt"))),
                message: "failed".to_string(),
                suggestion: None,
            })
            .collect();

        let summary = format_error_summary(&records);
        assert!(summary.contains("I/O error (5):"));
        assert!(summary.contains("... 2 more"));
        assert!(!summary.contains("f3.txt"));
    }

    #[test]
    fn test_error_record_not_found_is_plain_english() {
        let err = AssetError::Io(std::io::Error::new(ErrorKind::NotFound, "gone"));
        let record = ErrorRecord::new(Some(Path::new("log/example.txt")), &err);

        assert_eq!(record.kind, "I/O error");
        assert!(record.message.contains("disappeared"));
        assert!(record
            .path
            .as_ref()
            .is_some_and(|p| p == &PathBuf::from("log/example.txt")));
        assert!(record.suggestion.is_some());
    }

    #[test]
    fn test_error_record_path_invariant_names_root() {
        let err = AssetError::PathInvariant {
            path: PathBuf::from("/other/a.txt"),
            root: PathBuf::from("/in"),
        };
        let record = ErrorRecord::new(None, &err);
        assert_eq!(record.kind, "Outside input directory");
        assert!(record.message.contains("/in"));
        assert!(record.path.is_none());
    }
}
