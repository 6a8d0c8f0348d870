//! # build-asset - Asset Copy and Watch Tool
//!
//! Copies files matched by glob patterns from an input directory into an
//! output directory, keeping their relative layout, and optionally keeps the
//! output in step with later changes.
//!
//! The destination root is `output/[version]/[name]`. A full sync clears it
//! first unless asked to preserve existing files.

// Module declarations
pub mod config;
pub mod mapper;
pub mod resolver;
pub mod executor;
pub mod watcher;
pub mod engine;
pub mod ui;
pub mod commands;
pub mod types;

// Re-export commonly used types
pub use types::{AssetError, ChangeKind, FileChange, WatchSignal, WatchState};
pub use config::{SyncConfig, SyncOptions, WatchMode};
pub use engine::{SyncEngine, SyncEvent, SyncStats, WatchHandle, WatchOutcome, WatchStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
