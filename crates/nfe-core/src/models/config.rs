//! Configuration structures for the import pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the nfe pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NfeConfig {
    /// Structured extraction configuration.
    pub extraction: ExtractionConfig,

    /// Order reference resolution configuration.
    pub resolver: ResolverConfig,

    /// Batch import configuration.
    pub batch: BatchConfig,
}

/// Structured extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run advisory checks (check digits, totals) after extraction.
    pub validate: bool,

    /// Treat the `SEM GTIN` placeholder as a missing barcode.
    pub drop_placeholder_barcodes: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            validate: true,
            drop_placeholder_barcodes: true,
        }
    }
}

/// Order reference resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// JSON file holding the supplier extraction configs.
    pub suppliers_file: Option<PathBuf>,

    /// Supplier names containing any of these (case-insensitive) mark the default config.
    pub default_markers: Vec<String>,

    /// Upper bound on compiled pattern size, in bytes.
    pub pattern_size_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            suppliers_file: None,
            default_markers: vec![
                "padrão".to_string(),
                "padrao".to_string(),
                "default".to_string(),
                "geral".to_string(),
            ],
            pattern_size_limit: 1 << 20,
        }
    }
}

/// Batch import configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Stop at the first document that fails to parse.
    pub fail_fast: bool,

    /// Directory holding `<access_key>.json` records of earlier imports.
    pub output_dir: Option<PathBuf>,
}

impl NfeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
