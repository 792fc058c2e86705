//! Errors that abort a reconciliation run.
//!
//! Per-entry problems never show up here; they are recorded as
//! [`SyncOutcome::Failed`](crate::SyncOutcome::Failed) in the report.

use std::path::PathBuf;

use crate::runner::RunError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A tool required for the whole operation is not installed.
    #[error("{program} is not installed or not on PATH")]
    ToolUnavailable { program: String },

    /// A destination directory could not be prepared.
    #[error("preparing {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the downloader input file failed.
    #[error("writing download manifest: {0}")]
    Manifest(#[source] std::io::Error),

    /// The external command could not be run.
    #[error(transparent)]
    Run(#[from] RunError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
