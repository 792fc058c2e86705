//! Batch download planning.
//!
//! Turns model entries into the input file of a multi-connection downloader.
//! Pure data transformation: no filesystem or network access.

use provision_registry::AssetEntry;

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub url: String,
    /// Output path relative to the models directory.
    pub output: String,
}

/// Ordered list of downloads handed to the downloader in one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    items: Vec<ManifestItem>,
}

impl Manifest {
    pub fn items(&self) -> &[ManifestItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render in aria2c input-file format: each URL line is followed by an
    /// indented `out=` option.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{}\n  out={}", item.url, item.output))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Plan downloads for `entries`, preserving their order.
///
/// The output is `folder/name` when the entry has an explicit name and just
/// `folder` otherwise, leaving the remote filename to the downloader.
pub fn plan<'a>(entries: impl IntoIterator<Item = &'a AssetEntry>) -> Manifest {
    let items = entries
        .into_iter()
        .map(|entry| ManifestItem {
            url: entry.url.clone(),
            output: match &entry.name {
                Some(name) => format!("{}/{name}", entry.folder),
                None => entry.folder.to_string(),
            },
        })
        .collect();
    Manifest { items }
}
