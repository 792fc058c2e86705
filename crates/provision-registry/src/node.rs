//! Node registry: custom-node git repositories grouped by category.

use std::collections::BTreeMap;
use std::path::Path;

use crate::category::NodeCategory;
use crate::error::Result;
use crate::repo_url;
use crate::store::{self, Format};
use crate::AddOutcome;

/// A custom-node repository to keep checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    /// Normalized repository URL (see [`repo_url::normalize`]).
    pub url: String,
    pub category: NodeCategory,
}

impl NodeEntry {
    /// Build an entry, normalizing the URL. The URL is not validated here so
    /// that a bad line in a hand-edited registry surfaces as a per-entry
    /// sync failure instead of aborting the whole load.
    pub fn new(url: &str, category: NodeCategory) -> Self {
        NodeEntry {
            url: repo_url::normalize(url),
            category,
        }
    }

    /// Checkout directory name, or `None` if the URL is not a repository URL.
    pub fn dir_name(&self) -> Option<String> {
        repo_url::repo_dir_name(&self.url)
    }
}

/// Desired custom-node repositories keyed by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRegistry {
    sections: BTreeMap<NodeCategory, Vec<NodeEntry>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry::default()
    }

    /// Load from a YAML registry or a legacy `.txt` URL list.
    ///
    /// A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(content) = store::read_source(path)? else {
            tracing::debug!(path = %path.display(), "no node registry yet");
            return Ok(NodeRegistry::new());
        };
        match Format::from_path(path) {
            Format::Yaml => NodeRegistry::parse_yaml(&content, path),
            Format::PlainText => Ok(NodeRegistry::parse_text(&content)),
        }
    }

    /// Parse a YAML document. Unknown category keys are filed under `other`.
    pub fn parse_yaml(content: &str, path: &Path) -> Result<Self> {
        let mut registry = NodeRegistry::new();
        for (key, entries) in store::parse_yaml(content, path)? {
            let category = NodeCategory::parse_lenient(&key);
            if entries.is_empty() {
                continue;
            }
            let section = registry.sections.entry(category).or_default();
            section.extend(entries.iter().map(|raw| NodeEntry::new(raw.url(), category)));
        }
        Ok(registry)
    }

    /// Parse a plain URL list. Every entry lands in `other`.
    pub fn parse_text(content: &str) -> Self {
        let mut registry = NodeRegistry::new();
        let entries = store::parse_text(content)
            .iter()
            .map(|url| NodeEntry::new(url, NodeCategory::Other))
            .collect::<Vec<_>>();
        if !entries.is_empty() {
            registry.sections.insert(NodeCategory::Other, entries);
        }
        registry
    }

    /// Write the registry back in the format implied by `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match Format::from_path(path) {
            Format::Yaml => self.to_yaml(path)?,
            Format::PlainText => self.to_text(),
        };
        store::write_atomic(path, &contents)
    }

    /// Persist a registry that just gained `added`.
    ///
    /// YAML registries are rewritten in full. Plain text lists get the new
    /// URL appended so that hand-written comments and disabled lines stay.
    pub fn save_added(&self, path: &Path, added: &NodeEntry) -> Result<()> {
        match Format::from_path(path) {
            Format::Yaml => self.save(path),
            Format::PlainText => store::append_line(path, &added.url),
        }
    }

    /// Render as YAML: categories in fixed order, bare URL entries.
    pub fn to_yaml(&self, path: &Path) -> Result<String> {
        let document: BTreeMap<NodeCategory, Vec<&str>> = self
            .sections
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(category, entries)| {
                (*category, entries.iter().map(|e| e.url.as_str()).collect())
            })
            .collect();
        store::to_yaml(&document, path)
    }

    /// Render as a plain URL list. Categories are not representable.
    pub fn to_text(&self) -> String {
        self.entries().map(|e| format!("{}\n", e.url)).collect()
    }

    /// Add a repository.
    ///
    /// The URL is normalized and must look like a hosted repository. An
    /// unknown category is filed under `other`. A repository that is already
    /// present, in any category, is reported as `AlreadyPresent` and the
    /// registry is left unchanged.
    pub fn add(&mut self, url: &str, category: &str) -> Result<(AddOutcome, NodeEntry)> {
        let entry = NodeEntry::new(url, NodeCategory::parse_lenient(category));
        repo_url::validate(&entry.url)?;

        if let Some(existing) = self.find(&entry.url) {
            tracing::warn!(
                url = %entry.url,
                category = %existing.category,
                "node already registered"
            );
            return Ok((AddOutcome::AlreadyPresent, existing.clone()));
        }

        self.sections
            .entry(entry.category)
            .or_default()
            .push(entry.clone());
        Ok((AddOutcome::Added, entry))
    }

    /// Entry for a repository, matched on the normalized URL.
    pub fn find(&self, url: &str) -> Option<&NodeEntry> {
        let normalized = repo_url::normalize(url);
        self.entries().find(|e| e.url == normalized)
    }

    /// All entries, category by category in a fixed order.
    pub fn entries(&self) -> impl Iterator<Item = &NodeEntry> {
        self.sections.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
