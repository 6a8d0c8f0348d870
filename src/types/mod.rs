//! Core type definitions for build-asset

mod error;
mod event;

pub(crate) use error::clone_error;
pub use error::AssetError;
pub use event::{ChangeKind, FileChange, WatchSignal, WatchState};
