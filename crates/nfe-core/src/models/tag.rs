//! Records produced by the generic tag walker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One leaf element with text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlTagRecord {
    /// Tag name as written in the document.
    pub tag_name: String,

    /// Trimmed text content.
    pub content: String,

    /// Attributes, `None` when the element has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,

    /// Slash-joined tag chain from the document root.
    pub path: String,
}

/// Records sharing the same path, grouped for tag discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub path: String,
    pub tag_name: String,
    /// Number of records at this path.
    pub occurrences: usize,
    /// Content of the first record at this path.
    pub sample: String,
}
