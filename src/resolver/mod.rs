//! Glob pattern resolution

mod patterns;
mod walker;

pub use patterns::{is_hidden, PatternSet};
pub use walker::{mirrored_files, resolve, resolve_dir};

use crate::config::SyncConfig;
use crate::types::AssetError;

/// Compile the config's patterns with its input root and hidden-file setting.
pub fn compile(config: &SyncConfig) -> Result<PatternSet, AssetError> {
    PatternSet::compile(
        config.source_patterns(),
        config.input_root(),
        config.include_hidden(),
    )
}
