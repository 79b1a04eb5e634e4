//! Tax id display for either identifier kind.

use super::cnpj::format_cnpj;
use super::cpf::format_cpf;
use super::patterns::digits_only;

/// Format a CNPJ (14 digits) or CPF (11 digits); other input is returned as is.
pub fn format_tax_id(tax_id: &str) -> String {
    let digits = digits_only(tax_id);
    match digits.len() {
        14 => format_cnpj(&digits),
        11 => format_cpf(&digits),
        _ => tax_id.to_string(),
    }
}
