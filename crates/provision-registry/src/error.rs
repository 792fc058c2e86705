//! Registry error types.

use std::path::PathBuf;

/// Errors that can occur while loading, editing, or saving a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry file exists but is not a well-formed registry document.
    #[error("invalid registry at {path}: {detail}")]
    Config { path: PathBuf, detail: String },

    /// An entry failed a closed-set or URL-shape check.
    #[error("invalid {field} '{input}': {reason}")]
    Validation {
        field: &'static str,
        input: String,
        reason: String,
    },

    /// No usable filename could be derived from a model URL.
    #[error("cannot derive a filename from '{url}'; provide one explicitly")]
    FilenameUnderivable { url: String },

    /// Writing the replacement registry file failed.
    #[error("failed to persist registry to {path}: {detail}")]
    Persist { path: PathBuf, detail: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Build a `Config` error for the given path.
    pub(crate) fn config(path: &std::path::Path, detail: impl Into<String>) -> Self {
        RegistryError::Config {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
