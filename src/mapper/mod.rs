//! Source-to-destination path mapping
//!
//! Mapping is purely lexical: nothing here touches the filesystem. Paths are
//! relativized component by component, so `/in` is never treated as a parent
//! of `/input/file.txt`.

use crate::types::AssetError;
use std::path::{Component, Path, PathBuf};

/// A source file and the destination it is copied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPath {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Map `source` into `destination_root`, preserving its position under `input_root`.
///
/// Relative sources are resolved against `input_root` first.
///
/// # Errors
/// * `AssetError::PathInvariant` - `source` is not strictly under `input_root`
///
/// # Example
/// ```
/// use build_asset::mapper::map_path;
/// use std::path::{Path, PathBuf};
///
/// let dest = map_path(
///     Path::new("/work/chat/log/example.txt"),
///     Path::new("/work/chat"),
///     Path::new("/out/1.2.0/chat"),
/// )?;
/// assert_eq!(dest, PathBuf::from("/out/1.2.0/chat/log/example.txt"));
/// # Ok::<(), build_asset::AssetError>(())
/// ```
pub fn map_path(
    source: &Path,
    input_root: &Path,
    destination_root: &Path,
) -> Result<PathBuf, AssetError> {
    let relative = relative_to_root(source, input_root)?;
    Ok(destination_root.join(relative))
}

/// Same as [`map_path`] but keeps the normalized source alongside the result.
pub fn map_pair(
    source: &Path,
    input_root: &Path,
    destination_root: &Path,
) -> Result<MappedPath, AssetError> {
    let absolute = absolutize(source, input_root);
    let destination = map_path(&absolute, input_root, destination_root)?;
    Ok(MappedPath {
        source: absolute,
        destination,
    })
}

/// Path of `source` relative to `input_root`.
///
/// Fails when the source lies outside the root or is the root itself.
pub fn relative_to_root(source: &Path, input_root: &Path) -> Result<PathBuf, AssetError> {
    let absolute = absolutize(source, input_root);
    let root = normalize(input_root);

    match absolute.strip_prefix(&root) {
        Ok(relative) if !relative.as_os_str().is_empty() => Ok(relative.to_path_buf()),
        _ => Err(AssetError::PathInvariant {
            path: absolute,
            root,
        }),
    }
}

/// Resolve `path` against `base` when relative, then normalize.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Lexically fold `.` and `..` components.
///
/// `..` at the filesystem root stays at the root; leading `..` on a relative
/// path is kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = out.components().next_back();
                match last {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
