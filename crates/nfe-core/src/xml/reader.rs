//! Tolerant accessors over an element tree.
//!
//! Every accessor treats a missing element as empty. NF-e producers leave
//! out optional groups freely, so nothing here ever fails.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::tree::{ElementTree, NodeId, XmlDocument};

/// Reads trimmed text and numbers out of an [`XmlDocument`].
#[derive(Debug, Clone, Copy)]
pub struct TagReader<'a> {
    doc: &'a XmlDocument,
}

impl<'a> TagReader<'a> {
    pub fn new(doc: &'a XmlDocument) -> Self {
        Self { doc }
    }

    /// The underlying document.
    pub fn document(&self) -> &'a XmlDocument {
        self.doc
    }

    /// First element matching `selector` under `scope`.
    pub fn find(&self, selector: &str, scope: Option<NodeId>) -> Option<NodeId> {
        self.doc.find_first(selector, scope)
    }

    /// All elements matching `selector` under `scope`.
    pub fn find_all(&self, selector: &str, scope: Option<NodeId>) -> Vec<NodeId> {
        self.doc.find_all(selector, scope)
    }

    /// Trimmed text of the first match, or an empty string.
    pub fn text_of(&self, selector: &str, scope: Option<NodeId>) -> String {
        self.find(selector, scope)
            .map(|id| self.doc.text_content(id).trim().to_string())
            .unwrap_or_default()
    }

    /// Like [`text_of`](Self::text_of) but `None` when the text is empty.
    pub fn optional_text_of(&self, selector: &str, scope: Option<NodeId>) -> Option<String> {
        let text = self.text_of(selector, scope);
        if text.is_empty() { None } else { Some(text) }
    }

    /// Text of the first match parsed as a float; `0.0` when absent or unparseable.
    pub fn number_of(&self, selector: &str, scope: Option<NodeId>) -> f64 {
        self.text_of(selector, scope)
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .unwrap_or(0.0)
    }

    /// Text of the first match as a [`Decimal`]; zero when absent or unparseable.
    pub fn decimal_of(&self, selector: &str, scope: Option<NodeId>) -> Decimal {
        let text = self.text_of(selector, scope);
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .unwrap_or(Decimal::ZERO)
    }

    /// Attribute `name` of the first element matching `selector`.
    pub fn attribute_of(
        &self,
        selector: &str,
        name: &str,
        scope: Option<NodeId>,
    ) -> Option<String> {
        self.find(selector, scope)
            .and_then(|id| self.doc.attribute(id, name))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}
