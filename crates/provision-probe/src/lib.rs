//! Compute backend detection for provision.
//!
//! [`ProbeChain`] asks vendor utilities which accelerator is present and
//! [`recommend`] turns the resulting [`CapabilityProfile`] into a PyTorch
//! install command.

pub mod compat;
pub mod probe;
pub mod profile;

pub use compat::{recommend, IndexFlag, InstallPlan};
pub use probe::{AppleSiliconProbe, NvidiaProbe, Probe, ProbeChain, RocmProbe, DEFAULT_PROBE_TIMEOUT};
pub use profile::{BackendKind, CapabilityProfile};
