//! Executor module for file operations
//!
//! [`Transfer`] is the seam between the sync engine and the filesystem. The
//! engine copies or removes single files, prunes directories emptied by a
//! removal, and clears the destination root; [`FsTransfer`] does that on the
//! local disk.

pub mod copy;

use crate::types::AssetError;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub use copy::copy_file_atomic;

/// Filesystem operations used by the sync engine
pub trait Transfer: Send + Sync {
    /// Copy `src` to `dest`, creating parent directories. Returns bytes copied.
    fn copy(&self, src: &Path, dest: &Path) -> Result<u64, AssetError>;

    /// Remove one file. A missing file is not an error; returns whether it existed.
    fn remove(&self, path: &Path) -> Result<bool, AssetError>;

    /// Recursively delete a directory tree. A missing tree is not an error.
    fn clear(&self, root: &Path) -> Result<(), AssetError>;

    /// Remove directories under and including `root` that hold no files.
    fn prune(&self, root: &Path) -> Result<(), AssetError> {
        prune_empty_dirs(root)
    }
}

/// Local-disk [`Transfer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTransfer;

impl Transfer for FsTransfer {
    fn copy(&self, src: &Path, dest: &Path) -> Result<u64, AssetError> {
        copy_file_atomic(src, dest)
    }

    fn remove(&self, path: &Path) -> Result<bool, AssetError> {
        remove_file_if_exists(path)
    }

    fn clear(&self, root: &Path) -> Result<(), AssetError> {
        clear_directory(root)
    }
}

/// Remove a file, treating `NotFound` as success.
pub fn remove_file_if_exists(path: &Path) -> Result<bool, AssetError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AssetError::Io(e)),
    }
}

/// Recursively delete `root`; a missing root is success, anything else propagates.
pub fn clear_directory(root: &Path) -> Result<(), AssetError> {
    let metadata = match fs::symlink_metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(AssetError::Io(e)),
    };

    let result = if metadata.file_type().is_dir() {
        fs::remove_dir_all(root)
    } else {
        fs::remove_file(root)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AssetError::Io(e)),
    }
}

/// Delete empty directories bottom-up, starting below `root`.
///
/// A directory that gains an entry while pruning is left in place.
pub fn prune_empty_dirs(root: &Path) -> Result<(), AssetError> {
    prune_dir(root).map(|_| ())
}

fn prune_dir(dir: &Path) -> Result<bool, AssetError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(AssetError::Io(e)),
    };

    let mut empty = true;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            empty &= prune_dir(&entry.path())?;
        } else {
            empty = false;
        }
    }

    if !empty {
        return Ok(false);
    }
    match fs::remove_dir(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => {
            tracing::debug!("keeping {}: {}", dir.display(), e);
            Ok(false)
        }
    }
}
