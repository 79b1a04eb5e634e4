//! Rules for Brazilian fiscal identifiers.

pub mod access_key;
pub mod cnpj;
pub mod cpf;
pub mod patterns;
pub mod tax_id;

pub use access_key::{validate_access_key, AccessKeyParts, ACCESS_KEY_LEN};
pub use cnpj::{format_cnpj, validate_cnpj};
pub use cpf::{format_cpf, validate_cpf};
pub use patterns::*;
pub use tax_id::format_tax_id;
