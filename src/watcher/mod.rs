//! File system watcher feeding the sync engine
//!
//! Wraps notify's recommended backend and turns its raw events into
//! [`WatchSignal`]s on a tokio channel. Filtering by pattern and expanding
//! directories happen in the engine; this layer only decides what counts as
//! add, change or unlink.

use crate::mapper;
use crate::types::{AssetError, ChangeKind, FileChange, WatchSignal};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Live subscription on a set of directories
///
/// Dropping it unsubscribes and closes the signal channel.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FsWatcher {
    /// Watch every root recursively.
    ///
    /// `WatchSignal::Ready` is queued once all roots are registered; events
    /// follow on the same channel.
    ///
    /// # Errors
    /// * `AssetError::Watch` - backend could not be created or a root could not be watched
    pub fn subscribe(
        roots: &[PathBuf],
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchSignal>), AssetError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for change in translate_event(&event) {
                        tracing::trace!(kind = %change.kind, path = %change.path.display(), "raw change");
                        if event_tx.send(WatchSignal::Event(change)).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => tracing::error!("watch error: {}", e),
            }
        })
        .map_err(|e| AssetError::Watch(e.to_string()))?;

        for root in roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| AssetError::Watch(format!("{}: {}", root.display(), e)))?;
            tracing::info!("started watching {}", root.display());
        }

        let _ = tx.send(WatchSignal::Ready);

        Ok((
            Self {
                _watcher: watcher,
                roots: roots.to_vec(),
            },
            rx,
        ))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Map one notify event to zero or more file changes.
///
/// Created and renamed-in paths are reported even when they are directories,
/// since files inside a directory that appears in one step produce no events
/// of their own; the engine expands them. Removed and renamed-away paths may
/// also be directories.
pub fn translate_event(event: &Event) -> Vec<FileChange> {
    let file = |kind: ChangeKind, path: &Path| FileChange::new(kind, mapper::normalize(path));
    let all = |kind: ChangeKind| -> Vec<FileChange> {
        event.paths.iter().map(|p| file(kind, p)).collect()
    };

    match &event.kind {
        EventKind::Create(_) => all(ChangeKind::Add),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => all(ChangeKind::Unlink),
            RenameMode::To => all(ChangeKind::Add),
            RenameMode::Both => {
                let mut changes = Vec::with_capacity(2);
                if let Some(from) = event.paths.first() {
                    changes.push(file(ChangeKind::Unlink, from));
                }
                if let Some(to) = event.paths.get(1) {
                    changes.push(file(ChangeKind::Add, to));
                }
                changes
            }
            RenameMode::Any | RenameMode::Other => event
                .paths
                .iter()
                .map(|p| {
                    if p.exists() {
                        file(ChangeKind::Add, p)
                    } else {
                        file(ChangeKind::Unlink, p)
                    }
                })
                .collect(),
        },
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| file(ChangeKind::Change, p))
            .collect(),
        EventKind::Remove(_) => all(ChangeKind::Unlink),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::fs;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(p.to_path_buf()))
    }

    #[test]
    fn test_create_file_is_add() {
        let changes = translate_event(&event(
            EventKind::Create(CreateKind::File),
            &[Path::new("/in/a.txt")],
        ));
        assert_eq!(
            changes,
            vec![FileChange::new(ChangeKind::Add, "/in/a.txt")]
        );
    }

    #[test]
    fn test_create_folder_is_add() {
        let changes = translate_event(&event(
            EventKind::Create(CreateKind::Folder),
            &[Path::new("/in/log")],
        ));
        assert_eq!(changes, vec![FileChange::new(ChangeKind::Add, "/in/log")]);
    }

    #[test]
    fn test_directory_rename_reports_both_ends() {
        let dir = TempDir::new().expect("create temp dir");
        let renamed = dir.path().join("log2");
        fs::create_dir(&renamed).expect("create renamed dir");
        let old = dir.path().join("log");

        let changes = translate_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[&old, &renamed],
        ));
        assert_eq!(
            changes,
            vec![
                FileChange::new(ChangeKind::Unlink, old),
                FileChange::new(ChangeKind::Add, renamed.clone()),
            ]
        );

        let moved_in = translate_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[&renamed],
        ));
        assert_eq!(moved_in, vec![FileChange::new(ChangeKind::Add, renamed)]);
    }

    #[test]
    fn test_remove_folder_is_unlink() {
        let changes = translate_event(&event(
            EventKind::Remove(RemoveKind::Folder),
            &[Path::new("/in/log")],
        ));
        assert_eq!(changes, vec![FileChange::new(ChangeKind::Unlink, "/in/log")]);
    }

    #[test]
    fn test_data_modify_is_change() {
        let changes = translate_event(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &[Path::new("/in/a.txt")],
        ));
        assert_eq!(
            changes,
            vec![FileChange::new(ChangeKind::Change, "/in/a.txt")]
        );
    }

    #[test]
    fn test_metadata_and_access_are_ignored() {
        let metadata = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            &[Path::new("/in/a.txt")],
        );
        let access = event(
            EventKind::Access(AccessKind::Any),
            &[Path::new("/in/a.txt")],
        );
        assert!(translate_event(&metadata).is_empty());
        assert!(translate_event(&access).is_empty());
    }

    #[test]
    fn test_remove_is_unlink() {
        let changes = translate_event(&event(
            EventKind::Remove(RemoveKind::File),
            &[Path::new("/in/log/a.txt")],
        ));
        assert_eq!(
            changes,
            vec![FileChange::new(ChangeKind::Unlink, "/in/log/a.txt")]
        );
    }

    #[test]
    fn test_rename_both_is_unlink_then_add() {
        let changes = translate_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[Path::new("/in/old.txt"), Path::new("/in/new.txt")],
        ));
        assert_eq!(
            changes,
            vec![
                FileChange::new(ChangeKind::Unlink, "/in/old.txt"),
                FileChange::new(ChangeKind::Add, "/in/new.txt"),
            ]
        );
    }

    #[test]
    fn test_rename_from_and_to() {
        let from = translate_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[Path::new("/in/old.txt")],
        ));
        let to = translate_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[Path::new("/in/new.txt")],
        ));
        assert_eq!(from[0].kind, ChangeKind::Unlink);
        assert_eq!(to[0].kind, ChangeKind::Add);
    }

    #[test]
    fn test_rename_any_checks_existence() {
        let dir = TempDir::new().expect("create temp dir");
        let present = dir.path().join("present.txt");
        let gone = dir.path().join("gone.txt");
        fs::write(&present, b"x").expect("write present");

        let changes = translate_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &[&present, &gone],
        ));
        assert_eq!(
            changes,
            vec![
                FileChange::new(ChangeKind::Add, present),
                FileChange::new(ChangeKind::Unlink, gone),
            ]
        );
    }

    #[test]
    fn test_modify_on_directory_is_ignored() {
        let dir = TempDir::new().expect("create temp dir");
        let changes = translate_event(&event(
            EventKind::Modify(ModifyKind::Any),
            &[dir.path()],
        ));
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_sends_ready_first() {
        let dir = TempDir::new().expect("create temp dir");
        let (watcher, mut signals) =
            FsWatcher::subscribe(&[dir.path().to_path_buf()]).expect("subscribe");

        assert_eq!(watcher.roots(), &[dir.path().to_path_buf()]);
        assert_eq!(signals.recv().await, Some(WatchSignal::Ready));
    }

    #[test]
    fn test_subscribe_missing_root_fails() {
        let result = FsWatcher::subscribe(&[PathBuf::from("/nonexistent/build-asset/root")]);
        assert!(matches!(result, Err(AssetError::Watch(_))));
    }
}
