//! PyTorch install recommendations.
//!
//! A static table maps a backend (and, for NVIDIA, the driver's CUDA major
//! version) to the wheel index that matches it.

use serde::Serialize;

use crate::profile::{BackendKind, CapabilityProfile};

const PACKAGES: [&str; 3] = ["torch", "torchvision", "torchaudio"];
const INSTALLER: [&str; 3] = ["uv", "pip", "install"];

/// How a row points the installer at its wheel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFlag {
    /// `--index-url`: the index replaces PyPI.
    IndexUrl,
    /// `--extra-index-url`: the index is consulted alongside PyPI.
    ExtraIndexUrl,
    /// Plain PyPI.
    None,
}

impl IndexFlag {
    fn as_arg(self) -> Option<&'static str> {
        match self {
            IndexFlag::IndexUrl => Some("--index-url"),
            IndexFlag::ExtraIndexUrl => Some("--extra-index-url"),
            IndexFlag::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Variant {
    flag: IndexFlag,
    url: &'static str,
}

#[derive(Debug)]
struct Row {
    backend: BackendKind,
    /// CUDA major version, NVIDIA rows only.
    major: Option<&'static str>,
    /// Short backend name, e.g. `cuda` or `mps`.
    kind: &'static str,
    /// Wheel tag, e.g. `cu124`.
    tag: &'static str,
    stable: Variant,
    nightly: Variant,
}

const fn index(url: &'static str) -> Variant {
    Variant {
        flag: IndexFlag::IndexUrl,
        url,
    }
}

const NVIDIA_DEFAULT_MAJOR: &str = "12";

static TABLE: &[Row] = &[
    Row {
        backend: BackendKind::Nvidia,
        major: Some("13"),
        kind: "cuda",
        tag: "cu124",
        stable: index("https://download.pytorch.org/whl/cu124"),
        nightly: index("https://download.pytorch.org/whl/nightly/cu124"),
    },
    Row {
        backend: BackendKind::Nvidia,
        major: Some("12"),
        kind: "cuda",
        tag: "cu124",
        stable: index("https://download.pytorch.org/whl/cu124"),
        nightly: index("https://download.pytorch.org/whl/nightly/cu124"),
    },
    Row {
        backend: BackendKind::Nvidia,
        major: Some("11"),
        kind: "cuda",
        tag: "cu118",
        stable: index("https://download.pytorch.org/whl/cu118"),
        nightly: index("https://download.pytorch.org/whl/nightly/cu118"),
    },
    Row {
        backend: BackendKind::Rocm,
        major: None,
        kind: "rocm",
        tag: "rocm6.2",
        stable: index("https://download.pytorch.org/whl/rocm6.2"),
        nightly: index("https://download.pytorch.org/whl/nightly/rocm6.2"),
    },
    Row {
        backend: BackendKind::AppleSilicon,
        major: None,
        kind: "mps",
        tag: "mps",
        // MPS support ships in the default wheels.
        stable: Variant {
            flag: IndexFlag::None,
            url: "",
        },
        nightly: Variant {
            flag: IndexFlag::ExtraIndexUrl,
            url: "https://download.pytorch.org/whl/nightly/cpu",
        },
    },
    Row {
        backend: BackendKind::None,
        major: None,
        kind: "cpu",
        tag: "cpu",
        stable: index("https://download.pytorch.org/whl/cpu"),
        nightly: index("https://download.pytorch.org/whl/nightly/cpu"),
    },
];

/// A concrete install command for a detected profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    /// Human-readable backend, e.g. `cuda (cu124)`.
    pub label: String,
    /// Short backend name: `cuda`, `mps`, `rocm` or `cpu`.
    pub backend: String,
    /// Wheel tag, e.g. `cu118`.
    pub backend_tag: String,
    pub nightly: bool,
    /// Full argv, program first.
    pub command_args: Vec<String>,
}

impl InstallPlan {
    pub fn command_line(&self) -> String {
        self.command_args.join(" ")
    }
}

fn lookup(backend: BackendKind, major: Option<&str>) -> &'static Row {
    let find = |major: Option<&str>| {
        TABLE
            .iter()
            .find(|row| row.backend == backend && (row.major.is_none() || row.major == major))
    };
    match backend {
        BackendKind::Nvidia => find(major)
            .or_else(|| find(Some(NVIDIA_DEFAULT_MAJOR)))
            .unwrap_or(&TABLE[1]),
        _ => find(None).unwrap_or(&TABLE[TABLE.len() - 1]),
    }
}

/// Recommend a PyTorch install for `profile`.
///
/// Deterministic: the same profile and flag always give the same plan.
pub fn recommend(profile: &CapabilityProfile, prefer_nightly: bool) -> InstallPlan {
    let major = match profile.backend {
        BackendKind::Nvidia => profile.compute_major(),
        _ => None,
    };
    let row = lookup(profile.backend, major);
    let variant = if prefer_nightly { row.nightly } else { row.stable };

    let mut command_args: Vec<String> = INSTALLER.iter().map(|s| s.to_string()).collect();
    command_args.extend(PACKAGES.iter().map(|s| s.to_string()));
    if prefer_nightly {
        command_args.push("--pre".to_string());
    }
    if let Some(flag) = variant.flag.as_arg() {
        command_args.push(flag.to_string());
        command_args.push(variant.url.to_string());
    }

    let label = if row.backend == BackendKind::Nvidia {
        format!("{} ({})", row.kind, row.tag)
    } else {
        row.kind.to_string()
    };

    InstallPlan {
        label,
        backend: row.kind.to_string(),
        backend_tag: row.tag.to_string(),
        nightly: prefer_nightly,
        command_args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nvidia(cuda: Option<&str>) -> CapabilityProfile {
        CapabilityProfile {
            compute_version: cuda.map(str::to_string),
            ..CapabilityProfile::with_device(BackendKind::Nvidia, "RTX 3090")
        }
    }

    #[test]
    fn cuda_12_is_deterministic() {
        let first = recommend(&nvidia(Some("12.4")), false);
        let second = recommend(&nvidia(Some("12.1")), false);
        assert_eq!(first, second);
        assert_eq!(first.backend_tag, "cu124");
        assert_eq!(first.label, "cuda (cu124)");
        assert_eq!(
            first.command_line(),
            "uv pip install torch torchvision torchaudio --index-url https://download.pytorch.org/whl/cu124"
        );
    }

    #[test]
    fn cuda_13_and_11() {
        assert_eq!(recommend(&nvidia(Some("13.0")), false).backend_tag, "cu124");
        assert_eq!(recommend(&nvidia(Some("11.8")), false).backend_tag, "cu118");
    }

    #[test]
    fn unknown_or_missing_major_uses_default_row() {
        let default = recommend(&nvidia(Some("12.0")), false);
        assert_eq!(recommend(&nvidia(Some("10.2")), false), default);
        assert_eq!(recommend(&nvidia(None), false), default);
    }

    #[test]
    fn cpu_rocm_and_mps() {
        let cpu = recommend(&CapabilityProfile::cpu(), false);
        assert_eq!(cpu.label, "cpu");
        assert!(cpu.command_line().ends_with("--index-url https://download.pytorch.org/whl/cpu"));

        let rocm = recommend(&CapabilityProfile::with_device(BackendKind::Rocm, "gfx1100"), false);
        assert_eq!(rocm.backend_tag, "rocm6.2");

        let mps = recommend(&CapabilityProfile::with_device(BackendKind::AppleSilicon, "Apple M3"), false);
        assert_eq!(mps.label, "mps");
        assert_eq!(mps.command_line(), "uv pip install torch torchvision torchaudio");
    }

    #[test]
    fn nightly_variants() {
        let cuda = recommend(&nvidia(Some("12.4")), true);
        assert_eq!(
            cuda.command_line(),
            "uv pip install torch torchvision torchaudio --pre --index-url https://download.pytorch.org/whl/nightly/cu124"
        );

        let mps = recommend(&CapabilityProfile::with_device(BackendKind::AppleSilicon, "Apple M1"), true);
        assert_eq!(
            mps.command_line(),
            "uv pip install torch torchvision torchaudio --pre --extra-index-url https://download.pytorch.org/whl/nightly/cpu"
        );
    }

    #[test]
    fn every_backend_has_a_row() {
        for backend in [
            BackendKind::None,
            BackendKind::Nvidia,
            BackendKind::AppleSilicon,
            BackendKind::Rocm,
        ] {
            assert_eq!(lookup(backend, None).backend, backend);
        }
    }
}
