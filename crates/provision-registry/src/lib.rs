//! Declarative registry of models and custom nodes to provision.
//!
//! Two registries describe the desired state of a workstation:
//! - **Model registry**: files to download, keyed by a strict set of model
//!   folders (`setup/models.yaml`).
//! - **Node registry**: custom-node git repositories, keyed by a lenient set
//!   of categories (`setup/nodes.yaml`, or the legacy `setup/nodes.txt`).
//!
//! Registries are loaded fresh for every invocation and are only changed by
//! explicit add operations. Saves replace the file atomically.
//!
//! Duplicate handling deliberately differs between the two: re-adding a model
//! asks for confirmation, re-adding a node is a silent no-op.

pub mod category;
pub mod error;
pub mod filename;
pub mod folder;
pub mod model;
pub mod node;
pub mod repo_url;
pub mod store;

// Re-exports for convenience.
pub use category::NodeCategory;
pub use error::{RegistryError, Result};
pub use filename::derive_filename;
pub use folder::ModelFolder;
pub use model::{AssetEntry, ModelRegistry};
pub use node::{NodeEntry, NodeRegistry};

/// Result of an add operation that did not fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry was appended.
    Added,
    /// A model with the same folder and name exists and the caller declined.
    Declined,
    /// The node repository is already registered; nothing changed.
    AlreadyPresent,
}
