//! End-to-end reconciliation against a fake git that touches the filesystem.

use std::collections::BTreeSet;
use std::path::Path;

use provision_registry::{ModelFolder, ModelRegistry, NodeRegistry};
use provision_sync::{
    CommandOutput, Destinations, DownloadOutcome, Reconciler, RecordingReporter, RunError,
    ScriptedRunner, SyncError, SyncOutcome,
};

/// git clone creates the target directory; pull reports nothing new.
fn fake_git() -> ScriptedRunner {
    ScriptedRunner::new(|inv| match inv.args.first().map(String::as_str) {
        Some("clone") => {
            let target = inv.args.last().ok_or_else(|| RunError::NotFound {
                program: inv.program.clone(),
            })?;
            std::fs::create_dir_all(target).map_err(|source| RunError::Io {
                program: inv.program.clone(),
                source,
            })?;
            Ok(CommandOutput::ok(""))
        }
        Some("-C") => Ok(CommandOutput::ok("Already up to date.\n")),
        _ if inv.program == "aria2c" => Ok(CommandOutput::ok("")),
        _ => Ok(CommandOutput::failed(1, "unexpected invocation")),
    })
}

fn dirs(root: &Path) -> BTreeSet<String> {
    std::fs::read_dir(root)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn nodes(text: &str) -> NodeRegistry {
    NodeRegistry::parse_text(text)
}

#[test]
fn second_run_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let nodes_dir = root.path().join("custom_nodes");
    let registry = nodes(
        "https://github.com/ltdrdata/ComfyUI-Manager\nhttps://github.com/cubiq/ComfyUI_essentials.git\n",
    );
    let runner = fake_git();
    let reporter = RecordingReporter::new();
    let reconciler = Reconciler::new(&runner, &reporter);

    let first = reconciler.sync_nodes(&registry, &nodes_dir).unwrap();
    assert!(first.details.iter().all(|d| d.outcome == SyncOutcome::Created));
    let after_first = dirs(&nodes_dir);

    let second = reconciler.sync_nodes(&registry, &nodes_dir).unwrap();
    assert!(second
        .details
        .iter()
        .all(|d| matches!(d.outcome, SyncOutcome::Skipped(_) | SyncOutcome::Updated)));
    assert_eq!(second.failed(), 0);
    assert_eq!(dirs(&nodes_dir), after_first);
    assert_eq!(
        after_first,
        BTreeSet::from(["ComfyUI-Manager".to_string(), "ComfyUI_essentials".to_string()])
    );
}

#[test]
fn one_bad_entry_does_not_stop_the_others() {
    let root = tempfile::tempdir().unwrap();
    let nodes_dir = root.path().join("custom_nodes");
    let registry = nodes(
        "https://github.com/o/first\nnot a repository url\nhttps://github.com/o/third\n",
    );
    let runner = fake_git();
    let reporter = RecordingReporter::new();

    let report = Reconciler::new(&runner, &reporter)
        .sync_nodes(&registry, &nodes_dir)
        .unwrap();

    assert_eq!(report.details.len(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 2);
    assert!(report.details[1].outcome.is_failure());
    assert!(nodes_dir.join("first").is_dir());
    assert!(nodes_dir.join("third").is_dir());
    assert_eq!(reporter.entries().len(), 3);
}

#[test]
fn full_run_combines_nodes_and_models() {
    let root = tempfile::tempdir().unwrap();
    let destinations = Destinations {
        models_dir: root.path().join("models"),
        nodes_dir: root.path().join("custom_nodes"),
    };
    let mut models = ModelRegistry::new();
    models
        .add("https://host/sd_xl_base_1.0.safetensors", "checkpoints", None, |_| true)
        .unwrap();
    models
        .add("https://host/vae.safetensors", ModelFolder::Vae.as_str(), None, |_| true)
        .unwrap();
    let registry = nodes("https://github.com/o/tool\n");

    let runner = fake_git();
    let reporter = RecordingReporter::new();
    let report = Reconciler::new(&runner, &reporter)
        .run(&models, &registry, &destinations)
        .unwrap();

    assert_eq!(report.models, DownloadOutcome::Completed { files: 2 });
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);
    assert!(destinations.models_dir.is_dir());

    let calls = runner.calls();
    let downloads: Vec<_> = calls.iter().filter(|c| c.program == "aria2c").collect();
    assert_eq!(downloads.len(), 1);
    assert_eq!(reporter.downloads(), vec![DownloadOutcome::Completed { files: 2 }]);
}

#[test]
fn missing_downloader_is_fatal_but_nodes_already_ran() {
    let root = tempfile::tempdir().unwrap();
    let destinations = Destinations {
        models_dir: root.path().join("models"),
        nodes_dir: root.path().join("custom_nodes"),
    };
    let mut models = ModelRegistry::new();
    models
        .add("https://host/model.safetensors", "loras", None, |_| true)
        .unwrap();
    let registry = nodes("https://github.com/o/tool\n");

    let git = fake_git();
    let runner = ScriptedRunner::new(move |inv| {
        if inv.program == "aria2c" {
            return Err(RunError::NotFound {
                program: inv.program.clone(),
            });
        }
        provision_sync::CommandRunner::run(&git, inv)
    });
    let reporter = RecordingReporter::new();
    let err = Reconciler::new(&runner, &reporter)
        .run(&models, &registry, &destinations)
        .unwrap_err();

    assert!(matches!(err, SyncError::ToolUnavailable { .. }));
    assert!(destinations.nodes_dir.join("tool").is_dir());
}
