//! Watch events and watch-loop lifecycle

use std::fmt;
use std::path::PathBuf;

/// Kind of filesystem change reported for a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File appeared
    Add,
    /// File contents changed
    Change,
    /// File was removed
    Unlink,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Change => "change",
            ChangeKind::Unlink => "unlink",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change to an absolute source path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl FileChange {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Message delivered by a watcher to the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// Initial setup finished; only live events follow
    Ready,
    /// A change to a watched path
    Event(FileChange),
}

/// Lifecycle of a watch subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchState {
    /// Watcher setup in progress; events are not processed
    #[default]
    Initializing,
    /// Setup complete, waiting for the first live event
    Ready,
    /// Processing live events
    Active,
    /// Shut down; no further events are taken
    Stopped,
}
