use crate::core::{Company, FacturaError, Invoice, format_fixed2};

use super::Environment;

/// Builds the public verification link encoded into the printed QR
/// code. Field order is fixed by the catalog service.
pub fn qr_url(
    invoice: &Invoice,
    issuer: &Company,
    buyer_document: &str,
    cufe: &str,
    environment: Environment,
) -> Result<String, FacturaError> {
    let number = invoice
        .invoice_number
        .as_deref()
        .ok_or_else(|| FacturaError::Assembly("invoice has no assigned number".into()))?;
    let issued = invoice.issue_datetime()?;

    let pairs = [
        ("NumFac", number.to_owned()),
        ("FecFac", issued.format("%Y-%m-%d").to_string()),
        ("NitFac", issuer.nit.clone()),
        ("DocAdq", buyer_document.to_owned()),
        ("ValFac", format_fixed2(invoice.payable_amount)),
        ("ValIva", format_fixed2(invoice.tax_total())),
        ("ValOtroIm", "0.00".to_owned()),
        ("ValTotal", format_fixed2(invoice.payable_amount)),
        ("CUFE", cufe.to_owned()),
    ];

    let query: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", percent_encode(v)))
        .collect();
    Ok(format!(
        "{}/document/searchqr?{}",
        environment.verification_base_url(),
        query.join("&")
    ))
}

/// Minimal query-component encoding: unreserved characters pass
/// through, everything else becomes %XX over its UTF-8 bytes.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
