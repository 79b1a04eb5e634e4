//! CNPJ (Brazilian company tax id) validation and formatting.

use super::patterns::{CNPJ_PATTERN, digits_only};

const FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Validate a CNPJ using its two mod-11 check digits.
///
/// Accepts bare digits or the punctuated form `12.345.678/0001-95`.
pub fn validate_cnpj(cnpj: &str) -> bool {
    if !CNPJ_PATTERN.is_match(cnpj.trim()) {
        return false;
    }

    let digits: Vec<u32> = digits_only(cnpj)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    // Repeated digits pass the checksum but are never issued.
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..12], &FIRST_WEIGHTS) == digits[12]
        && check_digit(&digits[..13], &SECOND_WEIGHTS) == digits[13]
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        0 | 1 => 0,
        r => 11 - r,
    }
}

/// Format CNPJ as `XX.XXX.XXX/XXXX-XX`.
pub fn format_cnpj(cnpj: &str) -> String {
    let digits = digits_only(cnpj);

    if digits.len() != 14 {
        return cnpj.to_string();
    }

    format!(
        "{}.{}.{}/{}-{}",
        &digits[0..2],
        &digits[2..5],
        &digits[5..8],
        &digits[8..12],
        &digits[12..14]
    )
}
