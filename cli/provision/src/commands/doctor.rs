//! `provision doctor`: tool and project diagnostics.

use anyhow::Result;

use provision_registry::{ModelRegistry, NodeRegistry};
use provision_sync::{CommandRunner, Invocation};

use crate::config::Project;

/// Print external tool availability and the resolved project layout.
pub fn run(project: &Project, runner: &dyn CommandRunner) -> Result<()> {
    println!("=== provision doctor ===");
    println!();
    println!("provision version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let options = project.sync_options(None);
    println!("--- External Tools ---");
    print_tool_status(runner, &options.git_program, &["--version"]);
    print_tool_status(runner, &options.downloader.program, &["--version"]);
    print_tool_status(runner, "uv", &["--version"]);
    print_tool_status(runner, "nvidia-smi", &["--version"]);
    println!();

    println!("--- Project ---");
    match &project.source {
        Some(path) => println!("  config:          {}", path.display()),
        None => println!("  config:          not found (using defaults)"),
    }
    let destinations = project.destinations();
    println!("  models dir:      {}", destinations.models_dir.display());
    println!("  nodes dir:       {}", destinations.nodes_dir.display());
    println!("  concurrency:     {}", options.concurrency);

    let models_path = project.models_registry();
    match ModelRegistry::load(&models_path) {
        Ok(registry) => println!(
            "  model registry:  {} ({} entries)",
            models_path.display(),
            registry.len()
        ),
        Err(e) => println!("  model registry:  error: {e}"),
    }
    let nodes_path = project.nodes_registry();
    match NodeRegistry::load(&nodes_path) {
        Ok(registry) => println!(
            "  node registry:   {} ({} entries)",
            nodes_path.display(),
            registry.len()
        ),
        Err(e) => println!("  node registry:   error: {e}"),
    }

    Ok(())
}

fn print_tool_status(runner: &dyn CommandRunner, name: &str, args: &[&str]) {
    let invocation = Invocation::new(name, args.iter().copied())
        .with_timeout(Some(std::time::Duration::from_secs(5)));
    match runner.run(&invocation) {
        Ok(output) => {
            let first_line = output.stdout.lines().next().unwrap_or("(unknown version)");
            println!("  {name}: {first_line}");
        }
        Err(e) => {
            println!("  {name}: {e}");
        }
    }
}
