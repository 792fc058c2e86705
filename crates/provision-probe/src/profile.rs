//! Detected compute capability.

use std::fmt;

use serde::Serialize;

/// Accelerator family found on the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// No supported accelerator; run on CPU.
    #[default]
    None,
    Nvidia,
    AppleSilicon,
    Rocm,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::None => "none",
            BackendKind::Nvidia => "nvidia",
            BackendKind::AppleSilicon => "apple_silicon",
            BackendKind::Rocm => "rocm",
        })
    }
}

/// What a probe learned about the accelerator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityProfile {
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_version: Option<String>,
    /// CUDA version reported by the driver, e.g. `12.4`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl CapabilityProfile {
    /// The CPU-only profile.
    pub fn cpu() -> Self {
        CapabilityProfile::default()
    }

    pub fn with_device(backend: BackendKind, device_name: impl Into<String>) -> Self {
        CapabilityProfile {
            backend,
            device_name: Some(device_name.into()),
            ..CapabilityProfile::default()
        }
    }

    /// Major component of [`compute_version`](Self::compute_version).
    pub fn compute_major(&self) -> Option<&str> {
        self.compute_version
            .as_deref()
            .and_then(|v| v.split('.').next())
            .filter(|major| !major.is_empty())
    }
}
