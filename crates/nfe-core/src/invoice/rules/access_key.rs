//! NF-e access key (chave de acesso) validation and decomposition.

use serde::{Deserialize, Serialize};

use super::patterns::ACCESS_KEY;

/// Length of every NF-e access key.
pub const ACCESS_KEY_LEN: usize = 44;

/// Check the 44-digit shape and the mod-11 check digit.
///
/// Weights 2..=9 cycle over the first 43 digits starting from the right.
pub fn validate_access_key(key: &str) -> bool {
    if !ACCESS_KEY.is_match(key) {
        return false;
    }

    let digits: Vec<u32> = key.chars().filter_map(|c| c.to_digit(10)).collect();
    let sum: u32 = digits[..43]
        .iter()
        .rev()
        .zip((2..=9).cycle())
        .map(|(d, w)| d * w)
        .sum();

    let expected = match sum % 11 {
        0 | 1 => 0,
        r => 11 - r,
    };

    expected == digits[43]
}

/// Fields encoded positionally in an access key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyParts {
    /// IBGE state code of the issuer.
    pub state_code: String,
    /// Issue year and month, `YYMM`.
    pub year_month: String,
    /// Issuer CNPJ (or zero-padded CPF).
    pub issuer_tax_id: String,
    /// Document model, `55` for NF-e and `65` for NFC-e.
    pub model: String,
    pub series: String,
    pub number: String,
    /// Emission type (normal, contingency...).
    pub emission_type: String,
    pub numeric_code: String,
    pub check_digit: String,
}

impl AccessKeyParts {
    /// Split a 44-digit key; `None` for anything else.
    pub fn parse(key: &str) -> Option<Self> {
        if !ACCESS_KEY.is_match(key) {
            return None;
        }

        Some(Self {
            state_code: key[0..2].to_string(),
            year_month: key[2..6].to_string(),
            issuer_tax_id: key[6..20].to_string(),
            model: key[20..22].to_string(),
            series: key[22..25].to_string(),
            number: key[25..34].to_string(),
            emission_type: key[34..35].to_string(),
            numeric_code: key[35..43].to_string(),
            check_digit: key[43..44].to_string(),
        })
    }
}
