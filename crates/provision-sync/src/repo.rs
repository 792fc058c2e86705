//! Custom-node repository synchronization.
//!
//! A repository is cloned shallowly when its directory is absent and
//! fast-forwarded when present. Local state is never overwritten: a pull that
//! cannot fast-forward is skipped, not forced.

use std::path::Path;
use std::time::Duration;

use provision_registry::NodeEntry;

use crate::report::{EntryOutcome, SyncOutcome};
use crate::runner::{CommandRunner, Invocation, RunError};

/// Default name of the version-control client binary.
pub const DEFAULT_GIT: &str = "git";

const UP_TO_DATE_MARKER: &str = "Already up to date";

/// Reconciles one node entry against its checkout directory.
pub struct RepoSynchronizer<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
    timeout: Option<Duration>,
}

impl<'a> RepoSynchronizer<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        RepoSynchronizer {
            runner,
            program: DEFAULT_GIT.to_string(),
            timeout: None,
        }
    }

    /// Use a different git binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Kill clone or pull operations that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clone or fast-forward `entry` under `root`.
    pub fn reconcile(&self, entry: &NodeEntry, root: &Path) -> EntryOutcome {
        let Some(name) = entry.dir_name() else {
            return EntryOutcome {
                name: entry.url.clone(),
                url: entry.url.clone(),
                outcome: SyncOutcome::Failed("invalid repository URL".to_string()),
            };
        };
        let target = root.join(&name);

        let outcome = if target.exists() {
            self.update(&target)
        } else {
            self.clone_into(&entry.url, &target)
        };

        EntryOutcome {
            name,
            url: entry.url.clone(),
            outcome,
        }
    }

    fn update(&self, target: &Path) -> SyncOutcome {
        let invocation = self.git([
            "-C".to_string(),
            target.display().to_string(),
            "pull".to_string(),
            "--ff-only".to_string(),
        ]);

        match self.runner.run(&invocation) {
            Ok(out) if out.success() && out.stdout.contains(UP_TO_DATE_MARKER) => {
                SyncOutcome::Skipped("already up to date".to_string())
            }
            Ok(out) if out.success() => SyncOutcome::Updated,
            Ok(out) => {
                tracing::debug!(
                    dir = %target.display(),
                    stderr = %out.stderr_summary(),
                    "fast-forward not possible"
                );
                SyncOutcome::Skipped("update conflict or already current".to_string())
            }
            // The existing checkout is still usable.
            Err(e @ RunError::TimedOut { .. }) => {
                tracing::debug!(dir = %target.display(), error = %e, "pull abandoned");
                SyncOutcome::Skipped("update conflict or already current".to_string())
            }
            Err(e) => run_failure(e),
        }
    }

    fn clone_into(&self, url: &str, target: &Path) -> SyncOutcome {
        let invocation = self.git([
            "clone".to_string(),
            "--depth=1".to_string(),
            "--no-tags".to_string(),
            "--recurse-submodules".to_string(),
            "--shallow-submodules".to_string(),
            url.to_string(),
            target.display().to_string(),
        ]);

        match self.runner.run(&invocation) {
            Ok(out) if out.success() => SyncOutcome::Created,
            Ok(out) => SyncOutcome::Failed(out.stderr_summary()),
            Err(e) => run_failure(e),
        }
    }

    fn git<const N: usize>(&self, args: [String; N]) -> Invocation {
        // Never block on a credential prompt for private or missing repos.
        Invocation::new(self.program.clone(), args)
            .with_env("GIT_TERMINAL_PROMPT", "0")
            .with_timeout(self.timeout)
    }
}

fn run_failure(error: RunError) -> SyncOutcome {
    SyncOutcome::Failed(error.to_string())
}
