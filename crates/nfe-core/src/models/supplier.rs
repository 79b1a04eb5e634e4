//! Per-supplier order reference extraction settings.

use serde::{Deserialize, Serialize};

/// How to recover an order/DT number for one supplier.
///
/// An empty `tax_id` marks the default config used when no supplier-specific
/// entry exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierExtractionConfig {
    /// Seller CNPJ/CPF this config applies to; empty for the default.
    pub tax_id: String,

    /// Display name of the supplier.
    pub supplier_name: String,

    /// Annotation field to read (`infCpl`, `xPed`, `infAdFisco`, `infAdic`, `obsCont`).
    pub source_field: String,

    /// Regular expression whose first capture group is the order number.
    pub extraction_pattern: String,

    /// Free-form notes.
    pub description: String,
}

impl SupplierExtractionConfig {
    pub fn new(
        tax_id: impl Into<String>,
        supplier_name: impl Into<String>,
        source_field: impl Into<String>,
        extraction_pattern: impl Into<String>,
    ) -> Self {
        Self {
            tax_id: tax_id.into(),
            supplier_name: supplier_name.into(),
            source_field: source_field.into(),
            extraction_pattern: extraction_pattern.into(),
            description: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether this config has no tax id and acts as a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.tax_id.trim().is_empty()
    }
}
