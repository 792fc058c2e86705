//! Custom-node categories.
//!
//! Unlike model folders, categories are lenient: an unrecognized name is
//! filed under [`NodeCategory::Other`] with a warning instead of failing.

use std::fmt;

use serde::{Serialize, Serializer};

/// Grouping key for custom-node repositories in the node registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeCategory {
    Manager,
    Essentials,
    Controlnet,
    Video,
    Image,
    Audio,
    Utilities,
    #[default]
    Other,
}

impl NodeCategory {
    pub const ALL: &'static [NodeCategory] = &[
        NodeCategory::Manager,
        NodeCategory::Essentials,
        NodeCategory::Controlnet,
        NodeCategory::Video,
        NodeCategory::Image,
        NodeCategory::Audio,
        NodeCategory::Utilities,
        NodeCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeCategory::Manager => "manager",
            NodeCategory::Essentials => "essentials",
            NodeCategory::Controlnet => "controlnet",
            NodeCategory::Video => "video",
            NodeCategory::Image => "image",
            NodeCategory::Audio => "audio",
            NodeCategory::Utilities => "utilities",
            NodeCategory::Other => "other",
        }
    }

    /// Parse a category name, folding unknown names into `Other`.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    pub fn parse_lenient(s: &str) -> NodeCategory {
        let wanted = s.trim().to_ascii_lowercase();
        match NodeCategory::ALL.iter().copied().find(|c| c.as_str() == wanted) {
            Some(category) => category,
            None => {
                tracing::warn!(category = s, "unknown node category, using 'other'");
                NodeCategory::Other
            }
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
