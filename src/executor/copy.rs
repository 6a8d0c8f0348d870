//! Atomic file copy implementation

use crate::types::AssetError;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const BUFFER_SIZE: usize = 128 * 1024;

static PART_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Copy a file atomically using the write-then-rename strategy
///
/// 1. Create parent directories and a unique temporary `.part` sibling
/// 2. Stream the source into it and sync to disk
/// 3. Preserve metadata (permissions, mtime)
/// 4. Rename over the destination
///
/// Each call writes its own temporary file, so overlapping copies to one
/// destination never interleave bytes; whichever rename lands last wins.
///
/// # Returns
/// * `Ok(u64)` - Number of bytes copied
/// * `Err(AssetError)` - IO error; the temporary file is removed
///
/// # Example
/// ```no_run
/// use build_asset::executor::copy_file_atomic;
/// use std::path::Path;
///
/// let bytes = copy_file_atomic(Path::new("src/logo.png"), Path::new("dist/logo.png"))?;
/// # Ok::<(), build_asset::AssetError>(())
/// ```
pub fn copy_file_atomic(src: &Path, dest: &Path) -> Result<u64, AssetError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(AssetError::Io)?;
    }

    let part_path = part_path_for(dest);
    match write_part(src, &part_path) {
        Ok(total_bytes) => {
            if let Err(e) = fs::rename(&part_path, dest) {
                let _ = fs::remove_file(&part_path);
                return Err(AssetError::Io(e));
            }
            Ok(total_bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(&part_path);
            Err(e)
        }
    }
}

fn write_part(src: &Path, part_path: &Path) -> Result<u64, AssetError> {
    let mut src_file = File::open(src).map_err(AssetError::Io)?;
    let mut part_file = File::create(part_path).map_err(AssetError::Io)?;

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = src_file.read(&mut buffer).map_err(AssetError::Io)?;
        if bytes_read == 0 {
            break;
        }
        part_file
            .write_all(&buffer[..bytes_read])
            .map_err(AssetError::Io)?;
        total_bytes += bytes_read as u64;
    }

    part_file.sync_all().map_err(AssetError::Io)?;
    // Windows refuses to rename an open file
    drop(part_file);

    let src_metadata = fs::metadata(src).map_err(AssetError::Io)?;
    fs::set_permissions(part_path, src_metadata.permissions()).map_err(AssetError::Io)?;

    let mtime = src_metadata.modified().map_err(AssetError::Io)?;
    filetime::set_file_mtime(part_path, filetime::FileTime::from_system_time(mtime))
        .map_err(AssetError::Io)?;

    Ok(total_bytes)
}

/// `dir/.name.<pid>.<n>.part` next to the destination.
fn part_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = PART_COUNTER.fetch_add(1, Ordering::Relaxed);
    dest.with_file_name(format!(".{}.{}.{}.part", name, std::process::id(), seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_paths_are_unique_siblings() {
        let dest = Path::new("/out/log/example.txt");
        let a = part_path_for(dest);
        let b = part_path_for(dest);
        assert_ne!(a, b);
        assert_eq!(a.parent(), dest.parent());
        let name = a.file_name().expect("file name").to_string_lossy().into_owned();
        assert!(name.starts_with(".example.txt."));
        assert!(name.ends_with(".part"));
    }
}
