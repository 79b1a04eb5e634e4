//! WASM bindings for Brazilian NF-e XML import.
//!
//! This crate provides WebAssembly bindings for use in browsers and Node.js.
//! Supplier configs are fetched on the JS side and handed in as plain
//! arrays or as a promise of one.

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use nfe_core::error::NfeError;
use nfe_core::invoice::NfeExtractor;
use nfe_core::invoice::rules::{
    format_tax_id, validate_access_key, validate_cnpj, validate_cpf,
};
use nfe_core::models::supplier::SupplierExtractionConfig;
use nfe_core::resolver::PatternOutcome;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[derive(Serialize)]
struct ErrorJs {
    kind: &'static str,
    message: String,
}

fn nfe_error(e: &NfeError) -> JsValue {
    let error = ErrorJs {
        kind: e.kind(),
        message: e.to_string(),
    };
    serde_wasm_bindgen::to_value(&error).unwrap_or_else(|_| JsValue::from_str(&error.message))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Read a config array; `undefined` and `null` mean no configs.
fn supplier_configs(configs: JsValue) -> Result<Vec<SupplierExtractionConfig>, JsValue> {
    if configs.is_undefined() || configs.is_null() {
        return Ok(Vec::new());
    }
    serde_wasm_bindgen::from_value(configs)
        .map_err(|e| JsValue::from_str(&format!("invalid supplier configs: {}", e)))
}

/// Extract an invoice from NF-e XML.
///
/// `configs` is an optional array of supplier extraction configs.
#[wasm_bindgen]
pub fn extract_invoice(xml: &str, file_name: &str, configs: JsValue) -> Result<JsValue, JsValue> {
    let extractor = NfeExtractor::new().with_supplier_configs(supplier_configs(configs)?);
    let report = extractor
        .extract_report(xml, file_name)
        .map_err(|e| nfe_error(&e))?;
    to_js(&report)
}

/// Extract an invoice once the supplier config promise settles.
///
/// A rejected or malformed promise result only disables order references.
#[wasm_bindgen]
pub async fn extract_invoice_async(
    xml: String,
    file_name: String,
    configs: js_sys::Promise,
) -> Result<JsValue, JsValue> {
    let configs = match JsFuture::from(configs).await {
        Ok(value) => supplier_configs(value).unwrap_or_else(|e| {
            web_sys::console::warn_2(&"Ignoring supplier configs:".into(), &e);
            Vec::new()
        }),
        Err(e) => {
            web_sys::console::warn_2(&"Supplier configs unavailable:".into(), &e);
            Vec::new()
        }
    };

    let extractor = NfeExtractor::new().with_supplier_configs(configs);
    let report = extractor
        .extract_report(&xml, &file_name)
        .map_err(|e| nfe_error(&e))?;
    to_js(&report)
}

/// List every leaf element with text as `{tag_name, content, attributes?, path}`.
#[wasm_bindgen]
pub fn walk_tags(xml: &str) -> Result<JsValue, JsValue> {
    let records = nfe_core::walker::walk(xml).map_err(|e| nfe_error(&e))?;
    to_js(&records)
}

/// Leaf paths grouped with occurrence counts.
#[wasm_bindgen]
pub fn summarize_tags(xml: &str) -> Result<JsValue, JsValue> {
    let records = nfe_core::walker::walk(xml).map_err(|e| nfe_error(&e))?;
    to_js(&nfe_core::walker::summarize_tags(&records))
}

#[derive(Serialize)]
struct PatternResultJs {
    status: &'static str,
    value: Option<String>,
}

/// Try an extraction pattern against sample text.
///
/// Returns `{status: "matched" | "no_match" | "invalid", value}`.
#[wasm_bindgen]
pub fn test_pattern(pattern: &str, text: &str) -> Result<JsValue, JsValue> {
    let result = match nfe_core::resolver::test_pattern(pattern, text) {
        PatternOutcome::Matched(value) => PatternResultJs {
            status: "matched",
            value: Some(value),
        },
        PatternOutcome::NoMatch => PatternResultJs {
            status: "no_match",
            value: None,
        },
        PatternOutcome::InvalidPattern(reason) => PatternResultJs {
            status: "invalid",
            value: Some(reason),
        },
    };
    to_js(&result)
}

/// Validate a CNPJ check digit.
#[wasm_bindgen(js_name = validateCnpj)]
pub fn validate_cnpj_js(cnpj: &str) -> bool {
    validate_cnpj(cnpj)
}

/// Validate a CPF check digit.
#[wasm_bindgen(js_name = validateCpf)]
pub fn validate_cpf_js(cpf: &str) -> bool {
    validate_cpf(cpf)
}

/// Validate a 44-digit access key.
#[wasm_bindgen(js_name = validateAccessKey)]
pub fn validate_access_key_js(key: &str) -> bool {
    validate_access_key(key)
}

/// Format a CNPJ or CPF with punctuation; other input is returned as is.
#[wasm_bindgen(js_name = formatTaxId)]
pub fn format_tax_id_js(tax_id: &str) -> String {
    format_tax_id(tax_id)
}

/// Invoice importer class for browser use.
///
/// Keeps one supplier config snapshot across many documents.
#[wasm_bindgen]
pub struct NfeImporter {
    extractor: NfeExtractor,
}

#[wasm_bindgen]
impl NfeImporter {
    /// Create an importer without supplier configs.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            extractor: NfeExtractor::new(),
        }
    }

    /// Replace the supplier config snapshot.
    #[wasm_bindgen]
    pub fn set_supplier_configs(&mut self, configs: JsValue) -> Result<(), JsValue> {
        let configs = supplier_configs(configs)?;
        self.extractor = self.extractor.clone().with_supplier_configs(configs);
        Ok(())
    }

    /// Extract the invoice only.
    #[wasm_bindgen]
    pub fn extract(&self, xml: &str, file_name: &str) -> Result<JsValue, JsValue> {
        use nfe_core::invoice::InvoiceExtractor;

        let invoice = self
            .extractor
            .extract(xml, file_name)
            .map_err(|e| nfe_error(&e))?;
        to_js(&invoice)
    }

    /// Extract with warnings and timing.
    #[wasm_bindgen]
    pub fn extract_report(&self, xml: &str, file_name: &str) -> Result<JsValue, JsValue> {
        let report = self
            .extractor
            .extract_report(xml, file_name)
            .map_err(|e| nfe_error(&e))?;
        to_js(&report)
    }
}

impl Default for NfeImporter {
    fn default() -> Self {
        Self::new()
    }
}
