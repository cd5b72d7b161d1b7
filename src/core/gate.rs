use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::error::ValidationError;
use super::numbering::NumberingRange;
use super::types::{Buyer, Company, DigitalCertificate, Invoice};

/// Pre-submission gate. Runs before any document is assembled and
/// before any network I/O; collects *all* violations, not just the
/// first. A non-empty result aborts the pipeline with the invoice
/// marked rejected locally.
///
/// `certificate` and `numbering` are the freshly re-read active
/// certificate / active range for the invoice's document type;
/// `None` when none is configured. Certificate currency is checked
/// here too, so an expired or revoked certificate never makes it to
/// the signing step.
pub fn validate_before_submission(
    invoice: &Invoice,
    issuer: &Company,
    buyer: &Buyer,
    certificate: Option<&DigitalCertificate>,
    numbering: Option<&NumberingRange>,
    now: NaiveDateTime,
) -> Vec<ValidationError> {
    let today = now.date();
    let mut errors = Vec::new();

    if issuer.nit.trim().is_empty() {
        errors.push(ValidationError::new(
            "issuer.nit",
            "issuing company has no tax id configured",
        ));
    }
    if issuer.business_name.trim().is_empty() {
        errors.push(ValidationError::new(
            "issuer.business_name",
            "issuing company has no legal name configured",
        ));
    }

    match certificate {
        None => {
            errors.push(ValidationError::new(
                "issuer.certificate",
                "company has no digital certificate configured",
            ));
        }
        Some(cert) if !cert.is_currently_valid(now) => {
            errors.push(ValidationError::new(
                "issuer.certificate",
                "digital certificate is expired, revoked, or not yet in force",
            ));
        }
        Some(_) => {}
    }

    match numbering {
        None => {
            errors.push(ValidationError::new(
                "numbering",
                "no active numbering range for this document type",
            ));
        }
        Some(range) => {
            if !range.covers_date(today) {
                errors.push(ValidationError::new(
                    "numbering.validity",
                    "numbering resolution is not in force today",
                ));
            }
            if range.prefix.trim().is_empty() {
                errors.push(ValidationError::new(
                    "numbering.prefix",
                    "numbering range has no prefix configured",
                ));
            }
        }
    }

    if invoice
        .invoice_number
        .as_deref()
        .is_none_or(|n| n.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "invoice_number",
            "invoice has no number assigned",
        ));
    }
    if invoice
        .issue_date
        .as_deref()
        .is_none_or(|d| d.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "issue_date",
            "invoice has no issue date",
        ));
    }

    if buyer.document_number.trim().is_empty() {
        errors.push(ValidationError::new(
            "buyer.document_number",
            "buyer has no identity document number",
        ));
    }

    if invoice.lines.is_empty() {
        errors.push(ValidationError::new(
            "lines",
            "invoice must have at least one line item",
        ));
    } else {
        if invoice.lines.iter().any(|l| l.quantity <= Decimal::ZERO) {
            errors.push(ValidationError::new(
                "lines.quantity",
                "every line item must have a quantity greater than zero",
            ));
        }
        if invoice.lines.iter().any(|l| l.unit_price <= Decimal::ZERO) {
            errors.push(ValidationError::new(
                "lines.unit_price",
                "every line item must have a unit price greater than zero",
            ));
        }
    }

    if invoice.payable_amount <= Decimal::ZERO {
        errors.push(ValidationError::new(
            "payable_amount",
            "payable amount must be greater than zero",
        ));
    }
    if invoice.tax_inclusive_amount < invoice.tax_exclusive_amount {
        errors.push(ValidationError::new(
            "tax_inclusive_amount",
            "tax-inclusive amount cannot be smaller than the tax-exclusive amount",
        ));
    }

    if invoice.type_code.trim().is_empty() {
        errors.push(ValidationError::new(
            "type_code",
            "invoice has no document type code",
        ));
    }
    if invoice.currency_code.trim().is_empty() {
        errors.push(ValidationError::new(
            "currency_code",
            "invoice has no currency code",
        ));
    }

    errors
}
