//! Core library for Brazilian NF-e XML import.
//!
//! This crate provides:
//! - Tolerant tag reading over parsed XML
//! - Structured extraction of invoices (parties, items, totals, access key)
//! - Order/DT number resolution driven by per-supplier regex configs
//! - A schema-free tag walker for config authoring

pub mod error;
pub mod invoice;
pub mod models;
pub mod resolver;
pub mod walker;
pub mod xml;

pub use error::{ConfigSourceError, ExtractionError, NfeError, Result};
pub use invoice::{AccessKeySource, ExtractionReport, InvoiceExtractor, NfeExtractor};
pub use models::config::NfeConfig;
pub use models::invoice::{Address, LineItem, ParsedInvoice, Party, TaxTotals};
pub use models::supplier::SupplierExtractionConfig;
pub use models::tag::{TagSummary, XmlTagRecord};
pub use resolver::{
    AnnotationFields, OrderNumberResolver, PatternOutcome, StaticConfigSource,
    SupplierConfigSource,
};
pub use walker::{summarize_tags, walk};
pub use xml::{TagReader, XmlDocument};
