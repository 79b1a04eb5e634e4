//! CPF (Brazilian individual tax id) validation and formatting.

use super::patterns::{CPF_PATTERN, digits_only};

/// Validate a CPF using its two mod-11 check digits.
pub fn validate_cpf(cpf: &str) -> bool {
    if !CPF_PATTERN.is_match(cpf.trim()) {
        return false;
    }

    let digits: Vec<u32> = digits_only(cpf)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Weights run from `len + 1` down to 2.
fn check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        d => d,
    }
}

/// Format CPF as `XXX.XXX.XXX-XX`.
pub fn format_cpf(cpf: &str) -> String {
    let digits = digits_only(cpf);

    if digits.len() != 11 {
        return cpf.to_string();
    }

    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}
