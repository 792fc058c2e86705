//! provision CLI: keep a workstation's models and custom nodes in sync with
//! its registries.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use provision_sync::{SystemRunner, TracingReporter};

use commands::add_model::AddModelArgs;
use commands::detect_gpu::DetectArgs;
use commands::download::DownloadArgs;
use config::Project;

#[derive(Parser)]
#[command(name = "provision", version, about = "Declarative model and custom-node provisioning")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a model file for download (prompts when no arguments are given)
    AddModel {
        /// Direct download URL
        url: Option<String>,
        /// Target folder, e.g. checkpoints or ultralytics/bbox
        folder: Option<String>,
        /// File name (default: derived from the URL)
        name: Option<String>,
        /// Add duplicates without asking
        #[arg(long, short)]
        yes: bool,
    },
    /// Register a custom-node git repository (prompts when no URL is given)
    AddNode {
        /// Repository URL
        url: Option<String>,
        /// Category (manager, essentials, controlnet, video, image, audio, utilities, other)
        #[arg(long, default_value = "other")]
        category: String,
    },
    /// Download every registered model in one batch
    DownloadModels {
        /// Destination directory (default: paths.models_dir)
        models_dir: Option<PathBuf>,
        /// Model registry (default: paths.models_registry)
        config: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clone or update every registered custom node
    DownloadNodes {
        /// Destination directory (default: paths.nodes_dir)
        nodes_dir: Option<PathBuf>,
        /// Node registry (default: paths.nodes_registry)
        config: Option<PathBuf>,
        /// Concurrent git operations (default: sync.concurrency)
        #[arg(long, short)]
        jobs: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Synchronize nodes, then download models
    Sync {
        /// Concurrent git operations (default: sync.concurrency)
        #[arg(long, short)]
        jobs: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Detect the GPU and recommend a PyTorch build
    DetectGpu {
        /// Run the recommended install command
        #[arg(long)]
        install: bool,
        /// Prefer nightly wheels
        #[arg(long)]
        nightly: bool,
        /// Print the short backend name (cuda, mps, rocm, cpu) last
        #[arg(long)]
        output_backend: bool,
    },
    /// Check external tools and project configuration
    Doctor,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "provision=debug" } else { "provision=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let project = Project::discover(&cwd)?;
    let runner = SystemRunner;
    let reporter = TracingReporter;

    match cli.command {
        Commands::AddModel {
            url,
            folder,
            name,
            yes,
        } => commands::add_model::run(
            &project,
            AddModelArgs {
                url,
                folder,
                name,
                yes,
            },
        ),

        Commands::AddNode { url, category } => commands::add_node::run(&project, url, &category),

        Commands::DownloadModels {
            models_dir,
            config,
            json,
        } => {
            let args = DownloadArgs {
                dir: models_dir,
                registry: config,
                jobs: None,
            };
            let report = commands::download::models(&project, &args, &runner, &reporter)?;
            commands::download::finish(&report, json, None)
        }

        Commands::DownloadNodes {
            nodes_dir,
            config,
            jobs,
            json,
        } => {
            let args = DownloadArgs {
                dir: nodes_dir,
                registry: config,
                jobs,
            };
            let report = commands::download::nodes(&project, &args, &runner, &reporter)?;
            commands::download::finish(
                &report,
                json,
                Some("install each node's Python requirements before starting the app"),
            )
        }

        Commands::Sync { jobs, json } => {
            let args = DownloadArgs {
                jobs,
                ..DownloadArgs::default()
            };
            let report = commands::download::sync(&project, &args, &runner, &reporter)?;
            commands::download::finish(
                &report,
                json,
                Some("install each node's Python requirements before starting the app"),
            )
        }

        Commands::DetectGpu {
            install,
            nightly,
            output_backend,
        } => {
            let args = DetectArgs {
                install,
                nightly,
                output_backend,
            };
            commands::detect_gpu::run(&project, args, &runner).map(|_| ())
        }

        Commands::Doctor => commands::doctor::run(&project, &runner),
    }
}
