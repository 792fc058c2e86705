//! Accelerator probes and the ordered chain that runs them.
//!
//! A probe answers "is this accelerator here?" by running a vendor utility.
//! Anything short of a clean, parseable answer means absent: a missing
//! binary, a timeout, or a non-zero exit never aborts detection.

use std::sync::LazyLock;
use std::time::Duration;

use provision_sync::{CommandOutput, CommandRunner, Invocation};
use regex::Regex;

use crate::profile::{BackendKind, CapabilityProfile};

/// Default time allowed for each vendor utility.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// One accelerator check.
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    /// Return a profile if the accelerator is present.
    fn probe(&self, runner: &dyn CommandRunner, timeout: Duration) -> Option<CapabilityProfile>;
}

/// Run `program args..` and keep the output only when it exited cleanly.
fn query<const N: usize>(
    runner: &dyn CommandRunner,
    timeout: Duration,
    program: &str,
    args: [&str; N],
) -> Option<CommandOutput> {
    let invocation = Invocation::new(program, args).with_timeout(Some(timeout));
    match runner.run(&invocation) {
        Ok(out) if out.success() => Some(out),
        Ok(out) => {
            tracing::debug!(program, code = ?out.code, "probe command failed");
            None
        }
        Err(e) => {
            tracing::debug!(program, error = %e, "probe command unavailable");
            None
        }
    }
}

static CUDA_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CUDA Version:\s*(\d+\.\d+)").expect("valid CUDA version regex"));

/// NVIDIA GPUs via `nvidia-smi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NvidiaProbe;

impl Probe for NvidiaProbe {
    fn name(&self) -> &str {
        "nvidia"
    }

    fn probe(&self, runner: &dyn CommandRunner, timeout: Duration) -> Option<CapabilityProfile> {
        let out = query(
            runner,
            timeout,
            "nvidia-smi",
            ["--query-gpu=name,driver_version,memory.total", "--format=csv,noheader"],
        )?;
        let first = out.stdout.lines().next()?.trim();
        let fields: Vec<&str> = first.split(", ").map(str::trim).collect();
        let [name, driver, memory, ..] = fields.as_slice() else {
            return None;
        };
        if name.is_empty() {
            return None;
        }

        // The summary table is the only place the driver's CUDA version shows up.
        let compute_version = query(runner, timeout, "nvidia-smi", [])
            .and_then(|summary| {
                CUDA_VERSION
                    .captures(&summary.stdout)
                    .map(|caps| caps[1].to_string())
            });

        Some(CapabilityProfile {
            backend: BackendKind::Nvidia,
            device_name: Some(name.to_string()),
            driver_version: Some(driver.to_string()),
            compute_version,
            memory: Some(memory.to_string()),
        })
    }
}

/// Apple Silicon via the CPU brand string. Only meaningful on macOS.
#[derive(Debug, Clone, Copy)]
pub struct AppleSiliconProbe {
    os: &'static str,
}

impl Default for AppleSiliconProbe {
    fn default() -> Self {
        AppleSiliconProbe {
            os: std::env::consts::OS,
        }
    }
}

impl AppleSiliconProbe {
    /// Probe as if running on `os` (a `std::env::consts::OS` value).
    pub fn for_os(os: &'static str) -> Self {
        AppleSiliconProbe { os }
    }
}

impl Probe for AppleSiliconProbe {
    fn name(&self) -> &str {
        "apple_silicon"
    }

    fn probe(&self, runner: &dyn CommandRunner, timeout: Duration) -> Option<CapabilityProfile> {
        if self.os != "macos" {
            return None;
        }
        let out = query(runner, timeout, "sysctl", ["-n", "machdep.cpu.brand_string"])?;
        let brand = out.stdout.trim();
        brand
            .contains("Apple")
            .then(|| CapabilityProfile::with_device(BackendKind::AppleSilicon, brand))
    }
}

/// AMD GPUs via `rocm-smi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RocmProbe;

impl Probe for RocmProbe {
    fn name(&self) -> &str {
        "rocm"
    }

    fn probe(&self, runner: &dyn CommandRunner, timeout: Duration) -> Option<CapabilityProfile> {
        let out = query(runner, timeout, "rocm-smi", ["--showproductname"])?;
        Some(CapabilityProfile::with_device(BackendKind::Rocm, out.stdout.trim()))
    }
}

/// Probes tried in order; the first hit wins.
pub struct ProbeChain {
    probes: Vec<Box<dyn Probe>>,
    timeout: Duration,
}

impl Default for ProbeChain {
    fn default() -> Self {
        ProbeChain::new(vec![
            Box::new(NvidiaProbe),
            Box::new(AppleSiliconProbe::default()),
            Box::new(RocmProbe),
        ])
    }
}

impl ProbeChain {
    pub fn new(probes: Vec<Box<dyn Probe>>) -> Self {
        ProbeChain {
            probes,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Run probes until one finds an accelerator, falling back to CPU.
    pub fn detect(&self, runner: &dyn CommandRunner) -> CapabilityProfile {
        for probe in &self.probes {
            if let Some(profile) = probe.probe(runner, self.timeout) {
                tracing::info!(
                    probe = probe.name(),
                    device = profile.device_name.as_deref().unwrap_or("unknown"),
                    "accelerator detected"
                );
                return profile;
            }
            tracing::debug!(probe = probe.name(), "not present");
        }
        tracing::warn!("no accelerator detected, falling back to CPU");
        CapabilityProfile::cpu()
    }
}
