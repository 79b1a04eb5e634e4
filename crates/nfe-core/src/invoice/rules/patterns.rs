//! Common regex patterns for NF-e identifiers.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Anything that is not a digit, used to strip punctuation from ids
    pub static ref NON_DIGIT: Regex = Regex::new(r"[^0-9]").unwrap();

    // Access key: exactly 44 digits
    pub static ref ACCESS_KEY: Regex = Regex::new(r"^[0-9]{44}$").unwrap();

    // CNPJ, with or without punctuation (12.345.678/0001-95)
    pub static ref CNPJ_PATTERN: Regex = Regex::new(
        r"^([0-9]{2})\.?([0-9]{3})\.?([0-9]{3})/?([0-9]{4})-?([0-9]{2})$"
    ).unwrap();

    // CPF, with or without punctuation (123.456.789-09)
    pub static ref CPF_PATTERN: Regex = Regex::new(
        r"^([0-9]{3})\.?([0-9]{3})\.?([0-9]{3})-?([0-9]{2})$"
    ).unwrap();

    // NF-e placeholder for products without a barcode
    pub static ref NO_GTIN: Regex = Regex::new(r"(?i)^\s*sem\s+gtin\s*$").unwrap();
}

/// Keep only the ASCII digits of `value`.
pub fn digits_only(value: &str) -> String {
    NON_DIGIT.replace_all(value, "").into_owned()
}
