//! Batched model downloads through aria2c.

use std::io::Write;
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::plan::Manifest;
use crate::report::DownloadOutcome;
use crate::runner::{CommandRunner, Invocation, RunError};

/// Default downloader binary.
pub const DEFAULT_DOWNLOADER: &str = "aria2c";
/// Default parallel connections per download.
pub const DEFAULT_CONNECTIONS: u32 = 10;

/// Invokes aria2c once for a whole manifest.
///
/// Batching lets aria2c share its connection budget across files and resume
/// an interrupted batch with `--continue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aria2Downloader {
    pub program: String,
    pub connections: u32,
}

impl Default for Aria2Downloader {
    fn default() -> Self {
        Aria2Downloader {
            program: DEFAULT_DOWNLOADER.to_string(),
            connections: DEFAULT_CONNECTIONS,
        }
    }
}

impl Aria2Downloader {
    pub fn new(program: impl Into<String>, connections: u32) -> Self {
        Aria2Downloader {
            program: program.into(),
            connections: connections.max(1),
        }
    }

    /// The command line for one batch.
    pub fn invocation(&self, input_file: &Path, models_dir: &Path) -> Invocation {
        Invocation::new(
            self.program.clone(),
            [
                "-x".to_string(),
                self.connections.to_string(),
                "--disable-ipv6".to_string(),
                "--input-file".to_string(),
                input_file.display().to_string(),
                "--dir".to_string(),
                models_dir.display().to_string(),
                "--continue=true".to_string(),
            ],
        )
        .inherit_output()
    }

    /// Download every item of `manifest` into `models_dir`.
    ///
    /// An empty manifest does not invoke the downloader. A missing binary is
    /// an error; a non-zero exit is a failed outcome for the whole batch.
    pub fn download(
        &self,
        runner: &dyn CommandRunner,
        manifest: &Manifest,
        models_dir: &Path,
    ) -> Result<DownloadOutcome> {
        if manifest.is_empty() {
            return Ok(DownloadOutcome::Empty);
        }
        std::fs::create_dir_all(models_dir).map_err(|source| SyncError::Destination {
            path: models_dir.to_path_buf(),
            source,
        })?;

        // Removed on drop, after the downloader has exited.
        let mut input = tempfile::Builder::new()
            .prefix("provision-download-")
            .suffix(".txt")
            .tempfile()
            .map_err(SyncError::Manifest)?;
        input
            .write_all(manifest.render().as_bytes())
            .and_then(|_| input.flush())
            .map_err(SyncError::Manifest)?;

        let files = manifest.len();
        match runner.run(&self.invocation(input.path(), models_dir)) {
            Ok(out) if out.success() => Ok(DownloadOutcome::Completed { files }),
            Ok(out) => Ok(DownloadOutcome::Failed {
                files,
                exit_code: out.code,
            }),
            Err(RunError::NotFound { program }) => Err(SyncError::ToolUnavailable { program }),
            Err(e) => Err(e.into()),
        }
    }
}
