//! NF-e field extraction module.

mod extractor;
pub mod rules;

pub use extractor::{NfeExtractor, resolve_access_key};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::invoice::ParsedInvoice;

/// Where the access key was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKeySource {
    /// First `chNFe` element in the document.
    DirectTag,
    /// `chNFe` inside the authorization protocol (`infProt`).
    NestedTag,
    /// `Id` attribute of `infNFe`.
    IdAttribute,
}

/// Extraction output with diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Extracted invoice.
    pub invoice: ParsedInvoice,

    /// How the access key was located.
    pub access_key_source: AccessKeySource,

    /// Advisory validation warnings.
    pub warnings: Vec<String>,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Trait for invoice extractors.
pub trait InvoiceExtractor {
    /// Build a [`ParsedInvoice`] from raw XML text.
    fn extract(&self, xml_text: &str, file_name: &str) -> Result<ParsedInvoice>;
}
