//! Error types for build-asset

use std::path::PathBuf;
use thiserror::Error;

/// Error types for build-asset operations
#[derive(Debug, Error)]
pub enum AssetError {
    /// Standard IO error (automatically converted via #[from])
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source path does not live under the configured input root
    #[error("Path {path} is not under input root {root}")]
    PathInvariant { path: PathBuf, root: PathBuf },

    /// Glob pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Version manifest could not be read or lacks a version
    #[error("Manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// Watcher backend failed to subscribe
    #[error("Watch error: {0}")]
    Watch(String),

    /// Full sync finished but some files failed
    #[error("Sync completed with {failed} of {total} file(s) failing. {summary}")]
    Incomplete {
        failed: usize,
        total: usize,
        summary: String,
    },
}

impl AssetError {
    /// Errors that abort a run before any file is touched
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AssetError::Config(_)
                | AssetError::Pattern { .. }
                | AssetError::Manifest { .. }
                | AssetError::Watch(_)
        )
    }

    /// Errors scoped to a single source file
    pub fn is_per_file(&self) -> bool {
        matches!(self, AssetError::Io(_) | AssetError::PathInvariant { .. })
    }

    pub(crate) fn pattern(pattern: &str, message: impl ToString) -> Self {
        AssetError::Pattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn manifest(path: &std::path::Path, message: impl ToString) -> Self {
        AssetError::Manifest {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Duplicate an error for event reporting; io errors lose their inner source.
pub(crate) fn clone_error(error: &AssetError) -> AssetError {
    match error {
        AssetError::Io(e) => AssetError::Io(std::io::Error::new(e.kind(), e.to_string())),
        AssetError::Config(msg) => AssetError::Config(msg.clone()),
        AssetError::PathInvariant { path, root } => AssetError::PathInvariant {
            path: path.clone(),
            root: root.clone(),
        },
        AssetError::Pattern { pattern, message } => AssetError::Pattern {
            pattern: pattern.clone(),
            message: message.clone(),
        },
        AssetError::Manifest { path, message } => AssetError::Manifest {
            path: path.clone(),
            message: message.clone(),
        },
        AssetError::Watch(msg) => AssetError::Watch(msg.clone()),
        AssetError::Incomplete {
            failed,
            total,
            summary,
        } => AssetError::Incomplete {
            failed: *failed,
            total: *total,
            summary: summary.clone(),
        },
    }
}
