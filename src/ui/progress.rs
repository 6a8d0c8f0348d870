//! Progress reporting

use crate::engine::{SyncEvent, SyncStats, WatchOutcome};
use console::style;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

/// Progress bar for a full sync
pub struct ProgressReporter {
    copy_bar: ProgressBar,
    started_at: Mutex<Option<Instant>>,
    copied_bytes: Mutex<u64>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Reporter that draws nothing (quiet mode, tests)
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(copy_bar: ProgressBar) -> Self {
        if let Ok(template) =
            ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} files | {msg}")
        {
            copy_bar.set_style(template.progress_chars("=>-"));
        }
        Self {
            copy_bar,
            started_at: Mutex::new(None),
            copied_bytes: Mutex::new(0),
        }
    }

    /// Route a full sync event to the matching bar update.
    pub fn handle(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Started { total } => self.start_copy(*total as u64),
            SyncEvent::FileCopied {
                destination, bytes, ..
            } => self.complete_file(destination, *bytes),
            SyncEvent::FileError { source, error } => {
                self.file_error(source, &error.to_string())
            }
            SyncEvent::Complete { stats } => self.finish(stats),
        }
    }

    pub fn start_copy(&self, total_files: u64) {
        if let Ok(mut started) = self.started_at.lock() {
            *started = Some(Instant::now());
        }
        if let Ok(mut bytes) = self.copied_bytes.lock() {
            *bytes = 0;
        }
        self.copy_bar.set_length(total_files);
        self.copy_bar.set_position(0);
        self.copy_bar.set_message("Starting copy...".to_string());
    }

    /// Mark one file complete and refresh throughput display.
    pub fn complete_file(&self, destination: &Path, bytes: u64) {
        let total = match self.copied_bytes.lock() {
            Ok(mut copied) => {
                *copied = copied.saturating_add(bytes);
                *copied
            }
            Err(_) => 0,
        };
        self.copy_bar.inc(1);
        self.copy_bar.set_message(format!(
            "{} | {} copied | {}/s",
            destination.display(),
            HumanBytes(total),
            HumanBytes(self.throughput_bps(total))
        ));
    }

    pub fn file_error(&self, source: &Path, err: &str) {
        self.copy_bar.inc(1);
        self.copy_bar
            .println(format!("{} {}: {}", style("ERROR").red().bold(), source.display(), err));
    }

    pub fn finish(&self, stats: &SyncStats) {
        self.copy_bar
            .finish_with_message(format_copy_summary(stats, self.throughput_bps(stats.bytes_copied)));
    }

    pub fn position(&self) -> u64 {
        self.copy_bar.position()
    }

    fn throughput_bps(&self, bytes: u64) -> u64 {
        let started = self.started_at.lock().ok().and_then(|s| *s);
        match started {
            Some(started) => {
                let secs = started.elapsed().as_secs_f64();
                if secs > 0.0 {
                    (bytes as f64 / secs) as u64
                } else {
                    0
                }
            }
            None => 0,
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Final line of a full sync
pub fn format_copy_summary(stats: &SyncStats, throughput: u64) -> String {
    format!(
        "Copy complete: {} copied, {} failed of {} | {} total | {}/s",
        stats.copied,
        stats.failed,
        stats.total,
        HumanBytes(stats.bytes_copied),
        HumanBytes(throughput)
    )
}

/// One line per applied watch event
pub fn format_watch_outcome(outcome: &WatchOutcome) -> String {
    match outcome {
        WatchOutcome::Copied {
            source,
            destination,
            bytes,
        } => format!(
            "{} {} -> {} ({})",
            style("copy  ").green(),
            source.display(),
            destination.display(),
            HumanBytes(*bytes)
        ),
        WatchOutcome::Deleted {
            destination,
            existed,
            ..
        } => {
            let note = if *existed { "" } else { " (already absent)" };
            format!(
                "{} {}{}",
                style("delete").yellow(),
                destination.display(),
                note
            )
        }
        WatchOutcome::Failed { change, error } => format!(
            "{} {} {}: {}",
            style("error ").red().bold(),
            change.kind,
            change.path.display(),
            error
        ),
    }
}

/// Print watch outcomes to stdout unless quiet
pub struct WatchReporter {
    quiet: bool,
}

impl WatchReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn report(&self, outcome: &WatchOutcome) {
        if self.quiet && !matches!(outcome, WatchOutcome::Failed { .. }) {
            return;
        }
        println!("{}", format_watch_outcome(outcome));
    }
}
