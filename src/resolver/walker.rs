//! Expand a pattern set into concrete source files

use super::PatternSet;
use crate::mapper;
use crate::types::AssetError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Walk the pattern set's roots and collect every matching file.
///
/// Directories are never returned. Files under `skip_dir` (typically an output
/// directory nested inside the input root) are pruned. Walk errors such as
/// permission denied are logged and skipped.
///
/// # Returns
/// Absolute, normalized source paths in sorted order.
pub fn resolve(
    patterns: &PatternSet,
    skip_dir: Option<&Path>,
) -> Result<BTreeSet<PathBuf>, AssetError> {
    let start_time = Instant::now();
    let mut files = BTreeSet::new();

    for root in patterns.watch_roots() {
        walk_sources(patterns, &root, skip_dir, &mut files);
    }

    tracing::debug!(
        files = files.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "resolved source patterns"
    );
    Ok(files)
}

/// Matching files below one source directory, e.g. a directory renamed or
/// moved into the input root.
pub fn resolve_dir(
    patterns: &PatternSet,
    dir: &Path,
    skip_dir: Option<&Path>,
) -> Result<BTreeSet<PathBuf>, AssetError> {
    let mut files = BTreeSet::new();
    walk_sources(patterns, &mapper::normalize(dir), skip_dir, &mut files);
    Ok(files)
}

/// Files below `dir` in the destination tree whose source counterpart matches
/// the pattern set.
///
/// Used when a source directory disappears: only these copies are removed,
/// so unrelated files kept with `--keep` survive.
pub fn mirrored_files(
    patterns: &PatternSet,
    destination_root: &Path,
    dir: &Path,
) -> Result<BTreeSet<PathBuf>, AssetError> {
    let mut files = BTreeSet::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    let mut builder = ignore::WalkBuilder::new(dir);
    builder
        .standard_filters(false)
        .hidden(false)
        .follow_links(false);

    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("error while listing {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = mapper::normalize(entry.path());
        if let Ok(relative) = mapper::relative_to_root(&path, destination_root) {
            if patterns.is_match(&relative) {
                files.insert(path);
            }
        }
    }
    Ok(files)
}

fn walk_sources(
    patterns: &PatternSet,
    root: &Path,
    skip_dir: Option<&Path>,
    files: &mut BTreeSet<PathBuf>,
) {
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "pattern root does not exist");
        return;
    }

    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(!patterns.include_hidden())
        .follow_links(true);
    if let Some(skip) = skip_dir {
        let skip = skip.to_path_buf();
        builder.filter_entry(move |entry| !entry.path().starts_with(&skip));
    }

    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    "error during directory traversal: {}. Resolution continues with remaining files",
                    e
                );
                continue;
            }
        };

        let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let path = mapper::normalize(entry.path());
        if patterns.matches_path(&path) {
            files.insert(path);
        }
    }
}
