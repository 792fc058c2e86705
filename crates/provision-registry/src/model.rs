//! Model registry: files to download, grouped by target folder.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{RegistryError, Result};
use crate::filename::derive_filename;
use crate::folder::ModelFolder;
use crate::store;
use crate::AddOutcome;

/// A model file to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    /// Direct download URL.
    pub url: String,
    /// Folder under the models directory.
    pub folder: ModelFolder,
    /// Explicit filename. When absent the downloader picks the remote name.
    pub name: Option<String>,
}

impl AssetEntry {
    pub fn new(url: impl Into<String>, folder: ModelFolder, name: Option<String>) -> Self {
        AssetEntry {
            url: url.into(),
            folder,
            name,
        }
    }

    /// Name used for display and duplicate detection.
    ///
    /// Falls back from the explicit name to the URL-derived filename and
    /// finally to the URL itself, so it is never empty for a non-empty URL.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| derive_filename(&self.url))
            .unwrap_or_else(|| self.url.clone())
    }

    fn same_key(&self, folder: ModelFolder, display_name: &str) -> bool {
        self.folder == folder && self.display_name() == display_name
    }
}

#[derive(Serialize)]
struct ModelRecord<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Desired model files keyed by folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRegistry {
    sections: BTreeMap<ModelFolder, Vec<AssetEntry>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        ModelRegistry::default()
    }

    /// Load a registry from `path`. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        match store::read_source(path)? {
            Some(content) => ModelRegistry::parse(&content, path),
            None => {
                tracing::debug!(path = %path.display(), "no model registry yet");
                Ok(ModelRegistry::new())
            }
        }
    }

    /// Parse YAML content. `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut registry = ModelRegistry::new();
        for (key, entries) in store::parse_yaml(content, path)? {
            let folder: ModelFolder = key.parse().map_err(|_| {
                RegistryError::config(path, format!("unknown model folder '{key}'"))
            })?;
            if entries.is_empty() {
                continue;
            }
            let section = registry.sections.entry(folder).or_default();
            for raw in entries {
                section.push(AssetEntry::new(
                    raw.url().trim(),
                    folder,
                    raw.name().map(str::to_string),
                ));
            }
        }
        Ok(registry)
    }

    /// Write the full registry to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        store::write_atomic(path, &self.to_yaml(path)?)
    }

    /// Render as YAML with folders in a fixed order and `url` before `name`.
    pub fn to_yaml(&self, path: &Path) -> Result<String> {
        let document: BTreeMap<ModelFolder, Vec<ModelRecord<'_>>> = self
            .sections
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(folder, entries)| {
                let records = entries
                    .iter()
                    .map(|e| ModelRecord {
                        url: &e.url,
                        name: e.name.as_deref(),
                    })
                    .collect();
                (*folder, records)
            })
            .collect();
        store::to_yaml(&document, path)
    }

    /// Add a model to the registry.
    ///
    /// `folder` must be a known [`ModelFolder`]. Without an explicit `name`
    /// one is derived from the URL; if that fails the caller has to supply
    /// one. When the same `(folder, name)` is already present, `confirm` is
    /// asked whether to add it anyway. Declining leaves the registry as is.
    pub fn add(
        &mut self,
        url: &str,
        folder: &str,
        name: Option<&str>,
        confirm: impl FnOnce(&AssetEntry) -> bool,
    ) -> Result<(AddOutcome, AssetEntry)> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RegistryError::Validation {
                field: "URL",
                input: String::new(),
                reason: "a URL is required".to_string(),
            });
        }
        let folder: ModelFolder = folder.trim().parse()?;

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(explicit) => explicit.to_string(),
            None => derive_filename(url).ok_or_else(|| RegistryError::FilenameUnderivable {
                url: url.to_string(),
            })?,
        };
        let entry = AssetEntry::new(url, folder, Some(name.clone()));

        if let Some(existing) = self.find(folder, &name) {
            tracing::warn!(folder = %folder, name = %name, "model already registered");
            if !confirm(existing) {
                return Ok((AddOutcome::Declined, entry));
            }
        }

        self.sections.entry(folder).or_default().push(entry.clone());
        Ok((AddOutcome::Added, entry))
    }

    /// First entry with the given `(folder, display name)` key.
    pub fn find(&self, folder: ModelFolder, display_name: &str) -> Option<&AssetEntry> {
        self.sections
            .get(&folder)?
            .iter()
            .find(|e| e.same_key(folder, display_name))
    }

    /// All entries, folder by folder in a fixed order.
    pub fn entries(&self) -> impl Iterator<Item = &AssetEntry> {
        self.sections.values().flatten()
    }

    /// Entries for one folder.
    pub fn folder(&self, folder: ModelFolder) -> &[AssetEntry] {
        self.sections.get(&folder).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://huggingface.co/org/repo/resolve/main/model.safetensors";

    #[test]
    fn load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::load(&dir.path().join("models.yaml")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_folder_in_file_is_config_error() {
        let yaml = "weights:\n  - url: https://host/a.bin\n";
        let err = ModelRegistry::parse(yaml, Path::new("models.yaml")).unwrap_err();
        assert!(matches!(err, RegistryError::Config { .. }));
        assert!(err.to_string().contains("weights"));
    }

    #[test]
    fn add_derives_name() {
        let mut registry = ModelRegistry::new();
        let (outcome, entry) = registry.add(URL, "checkpoints", None, |_| false).unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        assert_eq!(entry.name.as_deref(), Some("model.safetensors"));
        assert_eq!(registry.folder(ModelFolder::Checkpoints).len(), 1);
    }

    #[test]
    fn add_rejects_unknown_folder() {
        let mut registry = ModelRegistry::new();
        let err = registry.add(URL, "weights", None, |_| true).unwrap_err();
        assert!(matches!(err, RegistryError::Validation { field: "folder", .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn add_requires_name_when_underivable() {
        let mut registry = ModelRegistry::new();
        let err = registry
            .add("https://civitai.com/api/download/models/123", "loras", None, |_| true)
            .unwrap_err();
        assert!(matches!(err, RegistryError::FilenameUnderivable { .. }));

        let (outcome, entry) = registry
            .add(
                "https://civitai.com/api/download/models/123",
                "loras",
                Some("detail.safetensors"),
                |_| true,
            )
            .unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        assert_eq!(entry.display_name(), "detail.safetensors");
    }

    #[test]
    fn duplicate_declined_keeps_one() {
        let mut registry = ModelRegistry::new();
        registry.add(URL, "checkpoints", None, |_| true).unwrap();

        let mut asked = false;
        let (outcome, _) = registry
            .add(URL, "checkpoints", None, |existing| {
                asked = true;
                assert_eq!(existing.display_name(), "model.safetensors");
                false
            })
            .unwrap();
        assert!(asked);
        assert_eq!(outcome, AddOutcome::Declined);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_confirmed_adds_second() {
        let mut registry = ModelRegistry::new();
        registry.add(URL, "checkpoints", None, |_| true).unwrap();
        let (outcome, _) = registry.add(URL, "checkpoints", None, |_| true).unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn same_name_in_other_folder_is_not_duplicate() {
        let mut registry = ModelRegistry::new();
        registry.add(URL, "checkpoints", None, |_| true).unwrap();
        let (outcome, _) = registry
            .add(URL, "unet", None, |_| panic!("should not ask"))
            .unwrap();
        assert_eq!(outcome, AddOutcome::Added);
    }

    #[test]
    fn round_trip_preserves_entries() {
        let yaml = r#"
vae:
  - url: https://host/vae/resolve/main/ae.safetensors
checkpoints:
  - url: https://host/a/model.safetensors
    name: renamed.safetensors
  - url: https://host/b/other.ckpt
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.yaml");

        let original = ModelRegistry::parse(yaml, &path).unwrap();
        original.save(&path).unwrap();
        let reloaded = ModelRegistry::load(&path).unwrap();

        assert_eq!(original, reloaded);
        assert_eq!(reloaded.len(), 3);
        let checkpoints = reloaded.folder(ModelFolder::Checkpoints);
        assert_eq!(checkpoints[0].name.as_deref(), Some("renamed.safetensors"));
        assert_eq!(checkpoints[1].name, None);
    }

    #[test]
    fn save_writes_url_before_name() {
        let mut registry = ModelRegistry::new();
        registry.add(URL, "loras", Some("x.safetensors"), |_| true).unwrap();
        let yaml = registry.to_yaml(Path::new("models.yaml")).unwrap();
        let url_pos = yaml.find("url:").unwrap();
        let name_pos = yaml.find("name:").unwrap();
        assert!(url_pos < name_pos);
        assert!(yaml.starts_with("loras:"));
    }
}
