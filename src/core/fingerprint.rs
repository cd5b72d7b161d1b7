use rust_decimal::{Decimal, RoundingStrategy};
use sha2::{Digest, Sha384};
use uuid::Uuid;

use super::error::FacturaError;
use super::types::parse_issue_datetime;

/// Normalized invoice header fields that feed the CUFE.
///
/// The fingerprint is a pure function of these inputs: recomputing
/// from identical values always yields the identical digest.
#[derive(Debug, Clone)]
pub struct CufeInputs<'a> {
    pub issuer_tax_id: &'a str,
    pub invoice_number: &'a str,
    /// Raw issue timestamp as recorded by intake.
    pub issue_date: &'a str,
    pub payable_amount: Decimal,
    pub tax_amount: Decimal,
    pub type_code: &'a str,
    pub currency_code: &'a str,
}

/// Compute the CUFE: SHA-384 over the concatenated normalized header,
/// returned as a 96-character uppercase hex digest.
///
/// Field order is fixed by the DIAN technical annex:
/// `[nit, number, YYYYMMDD, HHMMSS, payable, tax, type, currency, nit]`.
///
/// # Errors
///
/// `FacturaError::Assembly` when the issue date is not a valid ISO
/// timestamp. There is deliberately no wall-clock fallback.
pub fn generate_cufe(inputs: &CufeInputs<'_>) -> Result<String, FacturaError> {
    let issued = parse_issue_datetime(inputs.issue_date)?;

    let nit: String = inputs
        .issuer_tax_id
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let number: String = inputs
        .invoice_number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let date_digits = issued.format("%Y%m%d").to_string();
    let time_digits = issued.format("%H%M%S").to_string();
    let payable = format_fixed2(inputs.payable_amount);
    let tax = format_fixed2(inputs.tax_amount);

    let mut hasher = Sha384::new();
    for part in [
        nit.as_str(),
        number.as_str(),
        date_digits.as_str(),
        time_digits.as_str(),
        payable.as_str(),
        tax.as_str(),
        inputs.type_code,
        inputs.currency_code,
        nit.as_str(),
    ] {
        hasher.update(part.as_bytes());
    }

    Ok(to_upper_hex(&hasher.finalize()))
}

/// Non-deterministic correlation id, regenerated per submission
/// attempt. Internal audit reference only, never part of the document.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fixed 2-decimal rendering with `.` separator and no grouping,
/// matching the authority's amount normalization.
pub fn format_fixed2(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

fn to_upper_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out
}
