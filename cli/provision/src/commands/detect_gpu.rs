//! `provision detect-gpu`: find the accelerator and recommend a PyTorch build.

use anyhow::{bail, Result};

use provision_probe::{recommend, BackendKind, CapabilityProfile, InstallPlan, ProbeChain};
use provision_sync::{CommandRunner, Invocation};

use crate::config::Project;

#[derive(Debug, Clone, Copy, Default)]
pub struct DetectArgs {
    /// Run the recommended install command.
    pub install: bool,
    /// Prefer nightly wheels.
    pub nightly: bool,
    /// Print only the short backend name as the last line.
    pub output_backend: bool,
}

/// Run `provision detect-gpu [--install] [--nightly] [--output-backend]`.
pub fn run(project: &Project, args: DetectArgs, runner: &dyn CommandRunner) -> Result<InstallPlan> {
    let profile = ProbeChain::default()
        .with_timeout(project.probe_timeout())
        .detect(runner);
    print_profile(&profile);

    let plan = recommend(&profile, args.nightly);
    tracing::info!(backend = %plan.label, "recommended PyTorch build");

    if args.install {
        install(&plan, runner)?;
    } else {
        println!();
        println!("To install PyTorch, run:");
        println!("  {}", plan.command_line());
        println!();
    }

    if args.output_backend {
        println!("{}", plan.backend);
    }
    Ok(plan)
}

fn print_profile(profile: &CapabilityProfile) {
    if profile.backend == BackendKind::None {
        println!("No GPU detected, using CPU.");
        return;
    }
    println!("Backend: {}", profile.backend);
    let fields = [
        ("Device", &profile.device_name),
        ("Driver", &profile.driver_version),
        ("CUDA", &profile.compute_version),
        ("Memory", &profile.memory),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("  {label}: {value}");
        }
    }
}

fn install(plan: &InstallPlan, runner: &dyn CommandRunner) -> Result<()> {
    let Some((program, args)) = plan.command_args.split_first() else {
        bail!("empty install command");
    };
    tracing::info!(command = %plan.command_line(), "installing PyTorch");
    let output = runner.run(&Invocation::new(program.clone(), args.iter().cloned()).inherit_output())?;
    if !output.success() {
        bail!("PyTorch install failed ({})", output.stderr_summary());
    }
    tracing::info!(backend = %plan.label, "PyTorch installed");
    Ok(())
}
