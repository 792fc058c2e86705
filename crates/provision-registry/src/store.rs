//! On-disk registry documents.
//!
//! A registry document is a YAML mapping from section key (model folder or
//! node category) to a list of entries. Each entry is either a bare URL or a
//! `{url, name}` mapping:
//!
//! ```yaml
//! checkpoints:
//!   - url: https://huggingface.co/org/repo/resolve/main/model.safetensors
//!     name: model.safetensors
//! manager:
//!   - https://github.com/ltdrdata/ComfyUI-Manager.git
//! ```
//!
//! Node registries may also be a plain text list, one URL per line with
//! `#` comments. Writes always go to a sibling temp file that is then
//! renamed over the destination.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// One entry as written in a registry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawEntry {
    /// Bare URL shorthand.
    Url(String),
    /// URL with an optional explicit filename.
    Detailed {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl RawEntry {
    pub fn url(&self) -> &str {
        match self {
            RawEntry::Url(url) => url,
            RawEntry::Detailed { url, .. } => url,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            RawEntry::Url(_) => None,
            RawEntry::Detailed { name, .. } => name.as_deref(),
        }
    }
}

/// Section key to entries, as parsed from disk.
pub type Document = BTreeMap<String, Vec<RawEntry>>;

/// Storage format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    PlainText,
}

impl Format {
    /// `.txt` files are plain URL lists, everything else is YAML.
    pub fn from_path(path: &Path) -> Format {
        match path.extension().and_then(|e| e.to_str()) {
            Some("txt") => Format::PlainText,
            _ => Format::Yaml,
        }
    }
}

/// Read a registry file. `Ok(None)` means the file does not exist yet.
pub fn read_source(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RegistryError::config(path, format!("reading: {e}"))),
    }
}

/// Parse a YAML registry document.
///
/// An empty or comment-only document is an empty registry. A section whose
/// value is null (`loras:` with nothing under it) is an empty section.
pub fn parse_yaml(content: &str, path: &Path) -> Result<Document> {
    if is_blank(content) {
        return Ok(Document::new());
    }
    let raw: Option<BTreeMap<String, Option<Vec<RawEntry>>>> = serde_yaml::from_str(content)
        .map_err(|e| RegistryError::config(path, e.to_string()))?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, entries)| (key, entries.unwrap_or_default()))
        .collect())
}

/// Parse a plain text URL list.
pub fn parse_text(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serialize a document to YAML.
pub fn to_yaml<T: Serialize>(document: &T, path: &Path) -> Result<String> {
    serde_yaml::to_string(document).map_err(|e| RegistryError::Persist {
        path: path.to_path_buf(),
        detail: format!("serializing: {e}"),
    })
}

/// Replace `path` with `contents` without ever exposing a partial file.
///
/// The data is written to a temp file in the destination directory and
/// renamed into place. On failure the previous file is left untouched.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let persist_err = |detail: String| RegistryError::Persist {
        path: path.to_path_buf(),
        detail,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| persist_err(format!("creating directory: {e}")))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| persist_err(format!("creating temp file: {e}")))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| persist_err(format!("writing temp file: {e}")))?;
    tmp.persist(path)
        .map_err(|e| persist_err(format!("replacing file: {}", e.error)))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "registry written");
    Ok(())
}

/// Append one line to a plain text registry, keeping everything already in it.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut contents = read_source(path)?.unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(line);
    contents.push('\n');
    write_atomic(path, &contents)
}

fn is_blank(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---")
}
