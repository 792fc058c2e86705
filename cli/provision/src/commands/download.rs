//! `provision download-models`, `download-nodes` and `sync`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use provision_registry::{ModelRegistry, NodeRegistry};
use provision_sync::{
    format_summary, AggregateReport, CommandRunner, Reconciler, Reporter, SyncError,
};

use crate::config::Project;

/// What to reconcile and where.
#[derive(Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Overrides the configured destination directory.
    pub dir: Option<PathBuf>,
    /// Overrides the configured registry file.
    pub registry: Option<PathBuf>,
    /// Overrides the configured concurrency.
    pub jobs: Option<usize>,
}

/// Run `provision download-models [MODELS_DIR] [CONFIG]`.
pub fn models(
    project: &Project,
    args: &DownloadArgs,
    runner: &dyn CommandRunner,
    reporter: &dyn Reporter,
) -> Result<AggregateReport> {
    let registry_path = args
        .registry
        .as_deref()
        .map(|p| project.resolve(p))
        .unwrap_or_else(|| project.models_registry());
    let models_dir = args
        .dir
        .as_deref()
        .map(|p| project.resolve(p))
        .unwrap_or_else(|| project.destinations().models_dir);

    require_registry(&registry_path)?;
    let registry = ModelRegistry::load(&registry_path)?;
    tracing::info!(
        models = registry.len(),
        registry = %registry_path.display(),
        dir = %models_dir.display(),
        "downloading models"
    );

    let reconciler = Reconciler::new(runner, reporter).with_options(project.sync_options(args.jobs));
    let models = reconciler
        .download_models(&registry, &models_dir)
        .map_err(with_hint)?;
    Ok(AggregateReport {
        models,
        ..AggregateReport::default()
    })
}

/// Run `provision download-nodes [NODES_DIR] [CONFIG] [--jobs N]`.
pub fn nodes(
    project: &Project,
    args: &DownloadArgs,
    runner: &dyn CommandRunner,
    reporter: &dyn Reporter,
) -> Result<AggregateReport> {
    let registry_path = args
        .registry
        .as_deref()
        .map(|p| project.resolve(p))
        .unwrap_or_else(|| project.nodes_registry());
    let nodes_dir = args
        .dir
        .as_deref()
        .map(|p| project.resolve(p))
        .unwrap_or_else(|| project.destinations().nodes_dir);

    require_registry(&registry_path)?;
    let registry = NodeRegistry::load(&registry_path)?;
    tracing::info!(
        repos = registry.len(),
        registry = %registry_path.display(),
        dir = %nodes_dir.display(),
        "synchronizing nodes"
    );

    let reconciler = Reconciler::new(runner, reporter).with_options(project.sync_options(args.jobs));
    let nodes = reconciler.sync_nodes(&registry, &nodes_dir).map_err(with_hint)?;
    Ok(AggregateReport {
        nodes,
        ..AggregateReport::default()
    })
}

/// Run `provision sync [--jobs N]`: nodes first, then models.
pub fn sync(
    project: &Project,
    args: &DownloadArgs,
    runner: &dyn CommandRunner,
    reporter: &dyn Reporter,
) -> Result<AggregateReport> {
    let (models_path, nodes_path) = (project.models_registry(), project.nodes_registry());
    require_registry(&models_path)?;
    require_registry(&nodes_path)?;
    let models = ModelRegistry::load(&models_path)?;
    let nodes = NodeRegistry::load(&nodes_path)?;
    tracing::info!(models = models.len(), repos = nodes.len(), "synchronizing");

    let destinations = project.destinations();
    let reconciler = Reconciler::new(runner, reporter).with_options(project.sync_options(args.jobs));
    let nodes = reconciler
        .sync_nodes(&nodes, &destinations.nodes_dir)
        .map_err(with_hint)?;
    match reconciler.download_models(&models, &destinations.models_dir) {
        Ok(models) => Ok(AggregateReport { nodes, models }),
        Err(e) => {
            // Nodes are already on disk; show them before aborting.
            let partial = AggregateReport {
                nodes,
                ..AggregateReport::default()
            };
            eprint!("{}", format_summary(&partial));
            let synced = format!(
                "nodes synchronized ({} succeeded, {} failed), model download aborted",
                partial.succeeded(),
                partial.failed()
            );
            Err(with_hint(e).context(synced))
        }
    }
}

/// Print the report and fail if any entry failed.
pub fn finish(report: &AggregateReport, json: bool, tip: Option<&str>) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("serializing report")?
        );
    } else {
        print!("{}", format_summary(report));
    }

    let failed = report.failed();
    if failed > 0 {
        bail!("{failed} item(s) failed");
    }
    if let (Some(tip), false) = (tip, json) {
        println!("Tip: {tip}");
    }
    Ok(())
}

/// Unlike `add-*`, downloads refuse a registry file that does not exist.
fn require_registry(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("registry not found: {}", path.display());
    }
    Ok(())
}

fn with_hint(e: SyncError) -> anyhow::Error {
    match &e {
        SyncError::ToolUnavailable { program } => {
            let hint = format!("install {program} or set [download] program in provision.toml");
            anyhow::Error::new(e).context(hint)
        }
        _ => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_sync::{CommandOutput, RecordingReporter, RunError, ScriptedRunner, SyncOutcome};

    fn project_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let project = Project::discover(dir.path()).unwrap();
        (dir, project)
    }

    fn cloning_git() -> ScriptedRunner {
        ScriptedRunner::new(|inv| {
            if inv.args.first().map(String::as_str) == Some("clone") {
                if let Some(target) = inv.args.last() {
                    std::fs::create_dir_all(target).unwrap();
                }
            }
            Ok(CommandOutput::ok(""))
        })
    }

    #[test]
    fn nodes_use_overrides_relative_to_project() {
        let (dir, project) = project_with(&[(
            "custom.yaml",
            "utilities:\n  - https://github.com/o/util\n",
        )]);
        let runner = cloning_git();
        let reporter = RecordingReporter::new();
        let args = DownloadArgs {
            dir: Some(PathBuf::from("elsewhere")),
            registry: Some(PathBuf::from("custom.yaml")),
            ..DownloadArgs::default()
        };

        let report = nodes(&project, &args, &runner, &reporter).unwrap();
        assert_eq!(report.nodes.details[0].outcome, SyncOutcome::Created);
        assert!(dir.path().join("elsewhere/util").is_dir());
        finish(&report, false, None).unwrap();
    }

    #[test]
    fn malformed_registry_is_fatal() {
        let (_dir, project) = project_with(&[("setup/models.yaml", "checkpoints: [unterminated\n")]);
        let runner = ScriptedRunner::nothing_installed();
        let reporter = RecordingReporter::new();
        let err = models(&project, &DownloadArgs::default(), &runner, &reporter).unwrap_err();
        assert!(format!("{err:#}").contains("models.yaml"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn missing_downloader_carries_hint() {
        let (_dir, project) = project_with(&[(
            "setup/models.yaml",
            "vae:\n  - url: https://host/vae.safetensors\n",
        )]);
        let runner = ScriptedRunner::nothing_installed();
        let reporter = RecordingReporter::new();
        let err = models(&project, &DownloadArgs::default(), &runner, &reporter).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("install aria2c"));
    }

    #[test]
    fn failed_entry_fails_the_command() {
        let (_dir, project) = project_with(&[
            ("setup/models.yaml", ""),
            ("setup/nodes.txt", "https://github.com/o/good\nnot-a-url\n"),
        ]);
        let runner = cloning_git();
        let reporter = RecordingReporter::new();
        let report = sync(&project, &DownloadArgs::default(), &runner, &reporter).unwrap();
        assert_eq!(report.failed(), 1);
        assert!(finish(&report, true, None).is_err());
    }

    #[test]
    fn sync_keeps_node_results_when_downloader_is_missing() {
        let (dir, project) = project_with(&[
            ("setup/models.yaml", "vae:\n  - url: https://host/vae.safetensors\n"),
            ("setup/nodes.yaml", "other:\n  - https://github.com/o/one\n"),
        ]);
        let runner = ScriptedRunner::new(|inv| match inv.program.as_str() {
            "git" => {
                if let Some(target) = inv.args.last() {
                    std::fs::create_dir_all(target).unwrap();
                }
                Ok(CommandOutput::ok(""))
            }
            _ => Err(RunError::NotFound {
                program: inv.program.clone(),
            }),
        });
        let reporter = RecordingReporter::new();

        let err = sync(&project, &DownloadArgs::default(), &runner, &reporter).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("nodes synchronized (1 succeeded, 0 failed)"));
        assert!(text.contains("install aria2c"));
        assert_eq!(reporter.entries().len(), 1);
        assert!(dir.path().join("data/custom_nodes/one").is_dir());
    }

    #[test]
    fn missing_registry_is_fatal() {
        let (_dir, project) = project_with(&[("setup/models.yaml", "")]);
        let runner = ScriptedRunner::nothing_installed();
        let reporter = RecordingReporter::new();

        let args = DownloadArgs {
            registry: Some(PathBuf::from("setup/typo-nodes.txt")),
            ..DownloadArgs::default()
        };
        let err = nodes(&project, &args, &runner, &reporter).unwrap_err();
        assert!(err.to_string().contains("typo-nodes.txt"));

        let err = sync(&project, &DownloadArgs::default(), &runner, &reporter).unwrap_err();
        assert!(err.to_string().contains("nodes.yaml"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn missing_model_registry_is_fatal() {
        let (_dir, project) = project_with(&[]);
        let runner = ScriptedRunner::nothing_installed();
        let reporter = RecordingReporter::new();
        let err = models(&project, &DownloadArgs::default(), &runner, &reporter).unwrap_err();
        assert!(err.to_string().contains("models.yaml"));
    }

    #[test]
    fn empty_registries_succeed() {
        let (_dir, project) = project_with(&[
            ("setup/models.yaml", "# nothing yet\n"),
            ("setup/nodes.yaml", ""),
        ]);
        let runner = ScriptedRunner::nothing_installed();
        let reporter = RecordingReporter::new();
        let report = sync(&project, &DownloadArgs::default(), &runner, &reporter).unwrap();
        assert_eq!(report, AggregateReport::default());
        finish(&report, false, Some("nothing to do")).unwrap();
    }
}
