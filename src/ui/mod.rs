//! Terminal output

mod progress;

pub use progress::{
    format_copy_summary, format_watch_outcome, ProgressReporter, WatchReporter,
};
