//! Order/DT number resolution from free-text annotation fields.
//!
//! Suppliers write their order references into whatever annotation field
//! they like. Each supplier gets a [`SupplierExtractionConfig`] naming the
//! field and a regex; an entry with an empty tax id (or a default-marked
//! name) covers everyone else. Resolution is best effort: a bad pattern or
//! an unreachable config store yields `None`, never an error.

mod source;

use std::collections::BTreeMap;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::invoice::rules::digits_only;
use crate::models::config::ResolverConfig;
use crate::models::supplier::SupplierExtractionConfig;

pub use source::{StaticConfigSource, SupplierConfigSource, fetch_or_empty};

/// Names of the annotation fields the extractor collects.
pub mod fields {
    /// Complementary information for the taxpayer (infCpl).
    pub const COMPLEMENTARY_INFO: &str = "infCpl";
    /// Buyer's purchase order (xPed).
    pub const BUYER_ORDER: &str = "xPed";
    /// Notes for the fiscal authority (infAdFisco).
    pub const FISCAL_NOTES: &str = "infAdFisco";
    /// The whole additional information block (infAdic).
    pub const ADDITIONAL_INFO: &str = "infAdic";
    /// Free observation text (obsCont/xTexto).
    pub const OBSERVATION: &str = "obsCont";

    /// Every field, in the order they are read.
    pub const ALL: [&str; 5] = [
        COMPLEMENTARY_INFO,
        BUYER_ORDER,
        FISCAL_NOTES,
        ADDITIONAL_INFO,
        OBSERVATION,
    ];
}

/// Free-text annotation fields keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationFields(BTreeMap<String, String>);

impl AnnotationFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a trimmed field; blank values are skipped.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        if !value.is_empty() {
            self.0.insert(name.into(), value.to_string());
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnnotationFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

/// Result of applying one user-authored pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternOutcome {
    /// First capture group of the first match.
    Matched(String),
    /// No match, or a match without a non-empty first group.
    NoMatch,
    /// The pattern does not compile.
    InvalidPattern(String),
}

impl PatternOutcome {
    pub fn into_option(self) -> Option<String> {
        match self {
            PatternOutcome::Matched(value) => Some(value),
            PatternOutcome::NoMatch | PatternOutcome::InvalidPattern(_) => None,
        }
    }
}

/// Compile `pattern` case-insensitively and apply it to `text`.
pub fn apply_pattern(pattern: &str, text: &str, size_limit: usize) -> PatternOutcome {
    let regex = match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(size_limit)
        .build()
    {
        Ok(regex) => regex,
        Err(e) => return PatternOutcome::InvalidPattern(e.to_string()),
    };

    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PatternOutcome::Matched)
        .unwrap_or(PatternOutcome::NoMatch)
}

/// Apply `pattern` with the default size limit, for config tooling.
pub fn test_pattern(pattern: &str, text: &str) -> PatternOutcome {
    apply_pattern(pattern, text, ResolverConfig::default().pattern_size_limit)
}

/// Selects a supplier config and applies its pattern.
#[derive(Debug, Clone)]
pub struct OrderNumberResolver {
    configs: Vec<SupplierExtractionConfig>,
    default_markers: Vec<String>,
    pattern_size_limit: usize,
}

impl OrderNumberResolver {
    /// Create a resolver over a snapshot of supplier configs.
    pub fn new(configs: Vec<SupplierExtractionConfig>) -> Self {
        let settings = ResolverConfig::default();
        Self {
            configs,
            default_markers: settings.default_markers,
            pattern_size_limit: settings.pattern_size_limit,
        }
    }

    /// Apply marker and size-limit settings.
    pub fn with_settings(mut self, settings: &ResolverConfig) -> Self {
        self.default_markers = settings.default_markers.clone();
        self.pattern_size_limit = settings.pattern_size_limit;
        self
    }

    /// Build a resolver from an external config store.
    ///
    /// A failing store yields a resolver without configs.
    pub async fn from_source<S: SupplierConfigSource>(source: &S) -> Self {
        Self::new(fetch_or_empty(source).await)
    }

    pub fn configs(&self) -> &[SupplierExtractionConfig] {
        &self.configs
    }

    /// Pick the config for `tax_id`.
    ///
    /// Pass one looks for an exact tax id match (punctuation ignored); pass
    /// two falls back to the first default config.
    pub fn select_config(&self, tax_id: &str) -> Option<&SupplierExtractionConfig> {
        self.exact_match(tax_id).or_else(|| self.default_config())
    }

    fn exact_match(&self, tax_id: &str) -> Option<&SupplierExtractionConfig> {
        let wanted = digits_only(tax_id);
        if wanted.is_empty() {
            return None;
        }
        self.configs
            .iter()
            .find(|config| !config.is_wildcard() && digits_only(&config.tax_id) == wanted)
    }

    fn default_config(&self) -> Option<&SupplierExtractionConfig> {
        self.configs
            .iter()
            .find(|config| config.is_wildcard() || self.is_default_name(&config.supplier_name))
    }

    fn is_default_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.default_markers
            .iter()
            .any(|marker| !marker.is_empty() && name.contains(&marker.to_lowercase()))
    }

    /// Recover the order number for a document from supplier `tax_id`.
    pub fn resolve(&self, fields: &AnnotationFields, tax_id: &str) -> Option<String> {
        let Some(config) = self.select_config(tax_id) else {
            debug!("No supplier config for {}", tax_id);
            return None;
        };

        let Some(text) = fields.get(&config.source_field) else {
            debug!(
                "Field {} is empty for supplier {}",
                config.source_field, config.supplier_name
            );
            return None;
        };

        match apply_pattern(&config.extraction_pattern, text, self.pattern_size_limit) {
            PatternOutcome::Matched(value) => {
                debug!(
                    "Resolved order reference {} via {} config",
                    value, config.supplier_name
                );
                Some(value)
            }
            PatternOutcome::NoMatch => {
                debug!(
                    "Pattern for {} did not match field {}",
                    config.supplier_name, config.source_field
                );
                None
            }
            PatternOutcome::InvalidPattern(reason) => {
                warn!(
                    "Invalid extraction pattern for {}: {}",
                    config.supplier_name, reason
                );
                None
            }
        }
    }
}

/// Fetch configs from `source` and resolve in one step.
pub async fn resolve_from_source<S: SupplierConfigSource>(
    source: &S,
    fields: &AnnotationFields,
    tax_id: &str,
) -> Option<String> {
    OrderNumberResolver::from_source(source)
        .await
        .resolve(fields, tax_id)
}
