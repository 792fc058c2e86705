//! Reconciliation driver.
//!
//! Walks both registries and brings the destination directories in line
//! with them. A failing entry never aborts the run; only problems that make
//! the whole operation meaningless are returned as errors.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use provision_registry::{ModelRegistry, NodeEntry, NodeRegistry};

use crate::download::Aria2Downloader;
use crate::error::{Result, SyncError};
use crate::plan::plan;
use crate::repo::{RepoSynchronizer, DEFAULT_GIT};
use crate::report::{AggregateReport, DownloadOutcome, EntryOutcome, Reporter, SyncOutcome, SyncReport};
use crate::runner::CommandRunner;

/// Default number of repositories synchronized at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Where assets land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    pub models_dir: PathBuf,
    pub nodes_dir: PathBuf,
}

/// Tunables for a reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Upper bound on concurrent git operations. Zero is treated as one.
    pub concurrency: usize,
    pub git_program: String,
    pub git_timeout: Option<Duration>,
    pub downloader: Aria2Downloader,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            concurrency: DEFAULT_CONCURRENCY,
            git_program: DEFAULT_GIT.to_string(),
            git_timeout: None,
            downloader: Aria2Downloader::default(),
        }
    }
}

/// Drives reconciliation of both registries.
pub struct Reconciler<'a> {
    runner: &'a dyn CommandRunner,
    reporter: &'a dyn Reporter,
    options: SyncOptions,
}

/// A node slot after deduplication: either work to do or a settled outcome.
enum Slot<'r> {
    Pending(&'r NodeEntry),
    Settled(EntryOutcome),
}

impl<'a> Reconciler<'a> {
    pub fn new(runner: &'a dyn CommandRunner, reporter: &'a dyn Reporter) -> Self {
        Reconciler {
            runner,
            reporter,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Synchronize nodes, then download models.
    pub fn run(
        &self,
        models: &ModelRegistry,
        nodes: &NodeRegistry,
        destinations: &Destinations,
    ) -> Result<AggregateReport> {
        let nodes = self.sync_nodes(nodes, &destinations.nodes_dir)?;
        let models = self.download_models(models, &destinations.models_dir)?;
        Ok(AggregateReport { nodes, models })
    }

    /// Clone or update every node repository under `nodes_dir`.
    ///
    /// The report lists entries in registry order regardless of which worker
    /// finished first.
    pub fn sync_nodes(&self, registry: &NodeRegistry, nodes_dir: &Path) -> Result<SyncReport> {
        if registry.is_empty() {
            return Ok(SyncReport::default());
        }
        std::fs::create_dir_all(nodes_dir).map_err(|source| SyncError::Destination {
            path: nodes_dir.to_path_buf(),
            source,
        })?;

        let mut slots = dedupe(registry.entries());
        let pending: Vec<(usize, &NodeEntry)> = slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Slot::Pending(entry) => Some((i, *entry)),
                Slot::Settled(_) => None,
            })
            .collect();

        for slot in &slots {
            if let Slot::Settled(outcome) = slot {
                self.reporter.entry(outcome);
            }
        }

        let synchronizer = RepoSynchronizer::new(self.runner)
            .with_program(self.options.git_program.clone())
            .with_timeout(self.options.git_timeout);
        let workers = self.options.concurrency.max(1).min(pending.len());
        tracing::debug!(repos = pending.len(), workers, "synchronizing nodes");

        let cursor = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                let pending = &pending;
                let synchronizer = &synchronizer;
                scope.spawn(move || loop {
                    let next = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(&(slot, entry)) = pending.get(next) else {
                        break;
                    };
                    let outcome = synchronizer.reconcile(entry, nodes_dir);
                    self.reporter.entry(&outcome);
                    if tx.send((slot, outcome)).is_err() {
                        break;
                    }
                });
            }
        });
        drop(tx);

        for (slot, outcome) in rx {
            slots[slot] = Slot::Settled(outcome);
        }

        let details = slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Settled(outcome) => Some(outcome),
                Slot::Pending(_) => None,
            })
            .collect();
        Ok(SyncReport { details })
    }

    /// Download every registered model into `models_dir` as one batch.
    pub fn download_models(&self, registry: &ModelRegistry, models_dir: &Path) -> Result<DownloadOutcome> {
        let manifest = plan(registry.entries());
        if !manifest.is_empty() {
            self.reporter.download_started(manifest.len());
        }
        let outcome = self.options.downloader.download(self.runner, &manifest, models_dir)?;
        self.reporter.download_finished(&outcome);
        Ok(outcome)
    }
}

/// Settle duplicate URLs and directory collisions before any work starts.
fn dedupe<'r>(entries: impl Iterator<Item = &'r NodeEntry>) -> Vec<Slot<'r>> {
    let mut seen_urls: HashSet<&str> = HashSet::new();
    let mut dir_owners: HashMap<String, &str> = HashMap::new();

    entries
        .map(|entry| {
            let settle = |outcome: SyncOutcome| {
                Slot::Settled(EntryOutcome {
                    name: entry.dir_name().unwrap_or_else(|| entry.url.clone()),
                    url: entry.url.clone(),
                    outcome,
                })
            };

            if !seen_urls.insert(entry.url.as_str()) {
                return settle(SyncOutcome::Skipped("duplicate entry".to_string()));
            }
            if let Some(dir) = entry.dir_name() {
                if let Some(owner) = dir_owners.get(&dir) {
                    return settle(SyncOutcome::Failed(format!(
                        "directory name collision with {owner}"
                    )));
                }
                dir_owners.insert(dir, entry.url.as_str());
            }
            Slot::Pending(entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;
    use crate::runner::{CommandOutput, ScriptedRunner};
    use provision_registry::NodeCategory;

    fn registry(urls: &[&str]) -> NodeRegistry {
        let mut reg = NodeRegistry::new();
        for url in urls {
            reg.add(url, "other").unwrap();
        }
        reg
    }

    #[test]
    fn duplicates_and_collisions_are_settled_up_front() {
        let a = NodeEntry::new("https://github.com/a/tool", NodeCategory::Other);
        let dup = NodeEntry::new("https://github.com/a/tool.git", NodeCategory::Video);
        let clash = NodeEntry::new("https://gitlab.com/b/tool", NodeCategory::Other);
        let slots = dedupe([&a, &dup, &clash].into_iter());

        assert!(matches!(slots[0], Slot::Pending(_)));
        match &slots[1] {
            Slot::Settled(o) => assert_eq!(o.outcome, SyncOutcome::Skipped("duplicate entry".into())),
            Slot::Pending(_) => panic!("duplicate should be settled"),
        }
        match &slots[2] {
            Slot::Settled(o) => assert_eq!(
                o.outcome,
                SyncOutcome::Failed("directory name collision with https://github.com/a/tool.git".into())
            ),
            Slot::Pending(_) => panic!("collision should be settled"),
        }
    }

    #[test]
    fn results_keep_registry_order_under_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let urls: Vec<String> = (0..12).map(|i| format!("https://github.com/o/repo{i}")).collect();
        let reg = registry(&urls.iter().map(String::as_str).collect::<Vec<_>>());

        let runner = ScriptedRunner::new(|inv| {
            // Later repos finish first.
            let n: u64 = inv.args[5]
                .trim_start_matches("https://github.com/o/repo")
                .trim_end_matches(".git")
                .parse()
                .unwrap();
            std::thread::sleep(Duration::from_millis(2 * (12 - n)));
            Ok(CommandOutput::ok(""))
        });
        let reporter = RecordingReporter::new();
        let report = Reconciler::new(&runner, &reporter)
            .with_options(SyncOptions {
                concurrency: 4,
                ..SyncOptions::default()
            })
            .sync_nodes(&reg, dir.path())
            .unwrap();

        let names: Vec<_> = report.details.iter().map(|d| d.name.clone()).collect();
        let expected: Vec<_> = (0..12).map(|i| format!("repo{i}")).collect();
        assert_eq!(names, expected);
        assert_eq!(reporter.entries().len(), 12);
        assert_eq!(runner.calls().len(), 12);
    }

    #[test]
    fn zero_concurrency_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&["https://github.com/o/one"]);
        let runner = ScriptedRunner::new(|_| Ok(CommandOutput::ok("")));
        let reporter = RecordingReporter::new();
        let report = Reconciler::new(&runner, &reporter)
            .with_options(SyncOptions {
                concurrency: 0,
                ..SyncOptions::default()
            })
            .sync_nodes(&reg, dir.path())
            .unwrap();
        assert_eq!(report.details[0].outcome, SyncOutcome::Created);
    }

    #[test]
    fn empty_registries_do_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::nothing_installed();
        let reporter = RecordingReporter::new();
        let destinations = Destinations {
            models_dir: dir.path().join("models"),
            nodes_dir: dir.path().join("nodes"),
        };
        let report = Reconciler::new(&runner, &reporter)
            .run(&ModelRegistry::new(), &NodeRegistry::new(), &destinations)
            .unwrap();
        assert_eq!(report, AggregateReport::default());
        assert!(runner.calls().is_empty());
        assert!(!destinations.nodes_dir.exists());
    }
}
