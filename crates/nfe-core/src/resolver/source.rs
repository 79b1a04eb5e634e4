//! Where supplier configs come from.

use std::future::Future;

use tracing::warn;

use crate::error::ConfigSourceError;
use crate::models::supplier::SupplierExtractionConfig;

/// An external store of supplier extraction configs.
///
/// Fetching may be slow or fail; callers go through [`fetch_or_empty`] so
/// that a failure only means "no configs".
pub trait SupplierConfigSource {
    fn fetch_configs(
        &self,
    ) -> impl Future<Output = Result<Vec<SupplierExtractionConfig>, ConfigSourceError>> + Send;
}

/// Fetch configs, logging and swallowing any failure.
pub async fn fetch_or_empty<S: SupplierConfigSource>(source: &S) -> Vec<SupplierExtractionConfig> {
    match source.fetch_configs().await {
        Ok(configs) => configs,
        Err(e) => {
            warn!("Supplier configs unavailable, resolving without them: {}", e);
            Vec::new()
        }
    }
}

/// In-memory config list.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    configs: Vec<SupplierExtractionConfig>,
}

impl StaticConfigSource {
    pub fn new(configs: Vec<SupplierExtractionConfig>) -> Self {
        Self { configs }
    }

    /// Parse a JSON array of configs.
    pub fn from_json(json: &str) -> Result<Self, ConfigSourceError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

impl SupplierConfigSource for StaticConfigSource {
    async fn fetch_configs(&self) -> Result<Vec<SupplierExtractionConfig>, ConfigSourceError> {
        Ok(self.configs.clone())
    }
}
