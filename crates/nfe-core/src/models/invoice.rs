//! Normalized NF-e record produced by the structured extractor.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::invoice::rules::{format_cnpj, format_cpf, validate_access_key, validate_cnpj, validate_cpf};

/// A parsed electronic invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedInvoice {
    /// 44-character access key (chNFe), the natural key for deduplication.
    pub access_key: String,

    /// Document number (nNF).
    pub number: String,

    /// Document series.
    pub series: String,

    /// Issue timestamp as written in the document (dhEmi / dEmi).
    pub issue_date: String,

    /// Issuer (emitente).
    pub seller: Party,

    /// Recipient (destinatário).
    pub buyer: Party,

    /// Products in document order.
    pub line_items: Vec<LineItem>,

    /// Invoice grand total (vNF).
    pub total_value: Decimal,

    /// Aggregated taxes.
    pub tax_totals: TaxTotals,

    /// Order/DT number recovered from annotation fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_reference: Option<String>,

    /// Name of the imported file.
    pub file_name: String,

    /// When the record was built.
    pub imported_at: DateTime<Utc>,
}

/// Seller or buyer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Company tax id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,

    /// Individual tax id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,

    /// Legal name (xNome).
    pub name: String,

    /// Trade name (xFant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_name: Option<String>,

    pub address: Address,
}

impl Party {
    /// CNPJ when present, otherwise CPF.
    pub fn tax_id(&self) -> Option<&str> {
        self.cnpj.as_deref().or(self.cpf.as_deref())
    }

    /// Tax id with the usual punctuation.
    pub fn formatted_tax_id(&self) -> Option<String> {
        match (&self.cnpj, &self.cpf) {
            (Some(cnpj), _) => Some(format_cnpj(cnpj)),
            (None, Some(cpf)) => Some(format_cpf(cpf)),
            (None, None) => None,
        }
    }
}

/// Postal address (enderEmit / enderDest).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    /// Check if the address has any data.
    pub fn is_empty(&self) -> bool {
        [
            &self.street,
            &self.number,
            &self.neighborhood,
            &self.city,
            &self.state,
            &self.zip,
        ]
        .iter()
        .all(|part| part.is_empty())
    }

    /// Format address as a single line.
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        match (self.street.is_empty(), self.number.is_empty()) {
            (false, false) => parts.push(format!("{}, {}", self.street, self.number)),
            (false, true) => parts.push(self.street.clone()),
            _ => {}
        }
        if !self.neighborhood.is_empty() {
            parts.push(self.neighborhood.clone());
        }
        match (self.city.is_empty(), self.state.is_empty()) {
            (false, false) => parts.push(format!("{}/{}", self.city, self.state)),
            (false, true) => parts.push(self.city.clone()),
            (true, false) => parts.push(self.state.clone()),
            (true, true) => {}
        }
        if !self.zip.is_empty() {
            parts.push(format!("CEP {}", self.zip));
        }
        parts.join(" - ")
    }
}

/// A single product line (det).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Stable identity: product code, or `<number>-<position>` when the code is blank.
    pub id: String,

    /// 1-based position in the document.
    pub position: usize,

    /// Product description (xProd).
    pub description: String,

    /// Commercial quantity (qCom).
    pub quantity: Decimal,

    /// Commercial unit price (vUnCom).
    pub unit_price: Decimal,

    /// Line total (vProd).
    pub total: Decimal,

    /// Commercial unit of measure (uCom).
    pub unit: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ncm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfop: Option<String>,

    /// GTIN of the commercial unit, usually the box (cEAN).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_barcode: Option<String>,

    /// GTIN of the taxable unit (cEANTrib).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_barcode: Option<String>,
}

/// Tax aggregates from ICMSTot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxTotals {
    pub icms: Decimal,
    pub ipi: Decimal,
    pub pis: Decimal,
    pub cofins: Decimal,
}

impl TaxTotals {
    /// Sum of the four aggregates.
    pub fn sum(&self) -> Decimal {
        self.icms + self.ipi + self.pis + self.cofins
    }
}

impl ParsedInvoice {
    /// Equality ignoring `imported_at`.
    pub fn same_content(&self, other: &Self) -> bool {
        Self {
            imported_at: other.imported_at,
            ..self.clone()
        } == *other
    }

    /// Advisory checks; extraction never fails on these.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !validate_access_key(&self.access_key) {
            issues.push(format!("Access key {} fails check digit", self.access_key));
        }

        if self.number.is_empty() {
            issues.push("Missing document number".to_string());
        }

        if self.seller.name.is_empty() {
            issues.push("Missing seller name".to_string());
        }

        match (&self.seller.cnpj, &self.seller.cpf) {
            (Some(cnpj), _) if !validate_cnpj(cnpj) => {
                issues.push(format!("Seller CNPJ {} is invalid", cnpj));
            }
            (None, Some(cpf)) if !validate_cpf(cpf) => {
                issues.push(format!("Seller CPF {} is invalid", cpf));
            }
            (None, None) => issues.push("Missing seller tax id".to_string()),
            _ => {}
        }

        if let Some(cnpj) = &self.buyer.cnpj {
            if !validate_cnpj(cnpj) {
                issues.push(format!("Buyer CNPJ {} is invalid", cnpj));
            }
        }
        if let Some(cpf) = &self.buyer.cpf {
            if !validate_cpf(cpf) {
                issues.push(format!("Buyer CPF {} is invalid", cpf));
            }
        }

        if self.line_items.is_empty() {
            issues.push("No line items".to_string());
        }

        if self.total_value == Decimal::ZERO {
            issues.push("Invoice total is zero".to_string());
        }

        let line_sum: Decimal = self.line_items.iter().map(|item| item.total).sum();
        if line_sum > self.total_value + Decimal::new(1, 2) && !self.total_value.is_zero() {
            issues.push(format!(
                "Line item sum ({}) exceeds invoice total ({})",
                line_sum, self.total_value
            ));
        }

        issues
    }
}
