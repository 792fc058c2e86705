//! Per-entry outcomes, aggregate reports, and the reporter seam.

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

/// Result of reconciling one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The asset did not exist and was created.
    Created,
    /// The asset existed and was brought up to date.
    Updated,
    /// Nothing was done. Not a failure.
    Skipped(String),
    /// The entry could not be reconciled. Other entries are unaffected.
    Failed(String),
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Created => f.write_str("created"),
            SyncOutcome::Updated => f.write_str("updated"),
            SyncOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            SyncOutcome::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Outcome for a named entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    /// Checkout directory name, or the URL when none can be derived.
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Ordered outcomes of a node synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub details: Vec<EntryOutcome>,
}

impl SyncReport {
    /// Entries that did not fail (created, updated, or skipped).
    pub fn succeeded(&self) -> usize {
        self.details.len() - self.failed()
    }

    pub fn failed(&self) -> usize {
        self.details.iter().filter(|d| d.outcome.is_failure()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

/// Result of the single batched download.
///
/// The downloader only reports one exit code for the whole batch, so a
/// failure is attributed to every planned file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// Nothing to download; the downloader was not invoked.
    #[default]
    Empty,
    Completed { files: usize },
    Failed { files: usize, exit_code: Option<i32> },
}

impl DownloadOutcome {
    pub fn succeeded(&self) -> usize {
        match self {
            DownloadOutcome::Completed { files } => *files,
            _ => 0,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            DownloadOutcome::Failed { files, .. } => *files,
            _ => 0,
        }
    }
}

/// Combined result of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub nodes: SyncReport,
    pub models: DownloadOutcome,
}

impl AggregateReport {
    pub fn succeeded(&self) -> usize {
        self.nodes.succeeded() + self.models.succeeded()
    }

    pub fn failed(&self) -> usize {
        self.nodes.failed() + self.models.failed()
    }
}

/// Receives progress from the engine as it happens.
///
/// Implementations must tolerate calls from several worker threads.
pub trait Reporter: Send + Sync {
    /// A node entry finished.
    fn entry(&self, outcome: &EntryOutcome);

    /// The download batch is about to start.
    fn download_started(&self, _files: usize) {}

    /// The download batch finished.
    fn download_finished(&self, _outcome: &DownloadOutcome) {}
}

/// Emits outcomes as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn entry(&self, e: &EntryOutcome) {
        match &e.outcome {
            SyncOutcome::Created => tracing::info!(repo = %e.name, "cloned"),
            SyncOutcome::Updated => tracing::info!(repo = %e.name, "updated"),
            SyncOutcome::Skipped(reason) => tracing::warn!(repo = %e.name, %reason, "skipped"),
            SyncOutcome::Failed(reason) => {
                tracing::error!(repo = %e.name, url = %e.url, %reason, "failed")
            }
        }
    }

    fn download_started(&self, files: usize) {
        tracing::info!(files, "starting download");
    }

    fn download_finished(&self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Empty => tracing::info!("no models to download"),
            DownloadOutcome::Completed { files } => tracing::info!(files, "download complete"),
            DownloadOutcome::Failed { files, exit_code } => {
                tracing::error!(files, exit_code = ?exit_code, "download failed")
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<EntryOutcome>>,
    downloads: Mutex<Vec<DownloadOutcome>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        RecordingReporter::default()
    }

    pub fn entries(&self) -> Vec<EntryOutcome> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn downloads(&self) -> Vec<DownloadOutcome> {
        self.downloads.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl Reporter for RecordingReporter {
    fn entry(&self, outcome: &EntryOutcome) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(outcome.clone());
        }
    }

    fn download_finished(&self, outcome: &DownloadOutcome) {
        if let Ok(mut downloads) = self.downloads.lock() {
            downloads.push(*outcome);
        }
    }
}

/// Format a node report as a human-readable summary.
pub fn format_summary(report: &AggregateReport) -> String {
    let mut out = String::new();

    for entry in &report.nodes.details {
        let marker = if entry.outcome.is_failure() { "!" } else { " " };
        out.push_str(&format!("  {marker} {}: {}\n", entry.name, entry.outcome));
    }

    match report.models {
        DownloadOutcome::Empty => {}
        DownloadOutcome::Completed { files } => {
            out.push_str(&format!("    models: {files} file(s) downloaded\n"))
        }
        DownloadOutcome::Failed { files, exit_code } => {
            let code = exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            out.push_str(&format!(
                "  ! models: batch of {files} file(s) failed (exit {code})\n"
            ));
        }
    }

    out.push('\n');
    out.push_str(&format!(
        "Summary: {} succeeded, {} failed\n",
        report.succeeded(),
        report.failed()
    ));
    out
}
