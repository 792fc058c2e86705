//! Reconciliation engine for provision.
//!
//! Brings a workstation in line with its registries: node repositories are
//! cloned or fast-forwarded with git, model files are fetched in one aria2c
//! batch. External tools are reached through [`CommandRunner`] and progress
//! is delivered to a caller-supplied [`Reporter`].

pub mod download;
pub mod driver;
pub mod error;
pub mod plan;
pub mod repo;
pub mod report;
pub mod runner;

pub use download::Aria2Downloader;
pub use driver::{Destinations, Reconciler, SyncOptions};
pub use error::{Result, SyncError};
pub use plan::{plan, Manifest, ManifestItem};
pub use repo::RepoSynchronizer;
pub use report::{
    format_summary, AggregateReport, DownloadOutcome, EntryOutcome, RecordingReporter, Reporter,
    SyncOutcome, SyncReport, TracingReporter,
};
pub use runner::{CommandOutput, CommandRunner, Invocation, RunError, ScriptedRunner, SystemRunner};
