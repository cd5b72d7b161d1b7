use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::FacturaError;

/// Lifecycle state controlled by this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternalStatus {
    /// Created by order intake, still mutable.
    Draft,
    /// Submission started; line items are frozen. Irreversible.
    Issued,
    /// Terminal. Only reachable while the authority has not accepted.
    Cancelled,
}

/// Verdict state owned by the tax authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityStatus {
    /// Not yet submitted, or a resubmission is in flight.
    Pending,
    /// Accepted. Terminal for the cancellation path: an accepted
    /// invoice can only be reversed via a credit/debit note.
    Accepted,
    /// Rejected. The invoice may be resubmitted.
    Rejected,
    /// Cancelled locally before acceptance.
    Cancelled,
}

impl AuthorityStatus {
    /// Wire code used by the authority and in persisted records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// An electronic sales invoice as handed over by order intake.
///
/// All amounts arrive pre-computed by the upstream tax calculator;
/// this subsystem never decides which taxes apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Local record identifier, used to key submission attempts.
    pub id: u64,
    /// Assigned invoice number, e.g. "FAC-1-42". Must fall inside the
    /// active numbering range for the document type.
    pub invoice_number: Option<String>,
    /// Issue timestamp as recorded by intake ("YYYY-MM-DD HH:MM:SS").
    /// Kept raw: the fingerprint step parses it and fails hard on
    /// malformed values instead of substituting wall-clock time.
    pub issue_date: Option<String>,
    /// DIAN document type code ("01" = sales invoice).
    pub type_code: String,
    /// ISO 4217 currency, e.g. "COP".
    pub currency_code: String,
    /// Sum of line extension amounts.
    pub line_extension_amount: Decimal,
    /// Total before taxes.
    pub tax_exclusive_amount: Decimal,
    /// Total including taxes.
    pub tax_inclusive_amount: Decimal,
    /// Final amount due.
    pub payable_amount: Decimal,
    pub internal_status: InternalStatus,
    pub authority_status: AuthorityStatus,
    /// CUFE fingerprint, set once the authority accepts.
    pub cufe: Option<String>,
    /// Immutable once the invoice leaves draft.
    pub lines: Vec<LineItem>,
}

impl Invoice {
    /// Tax portion of the invoice (inclusive minus exclusive total).
    pub fn tax_total(&self) -> Decimal {
        self.tax_inclusive_amount - self.tax_exclusive_amount
    }

    /// Parse the raw issue timestamp. Accepts `YYYY-MM-DD HH:MM:SS`,
    /// the `T`-separated ISO variant, and a bare date (midnight).
    pub fn issue_datetime(&self) -> Result<NaiveDateTime, FacturaError> {
        let raw = self
            .issue_date
            .as_deref()
            .ok_or_else(|| FacturaError::Assembly("invoice has no issue date".into()))?;
        parse_issue_datetime(raw)
    }
}

/// Parse an intake-recorded issue timestamp. Unparseable input is an
/// assembly error; falling back to the current time would make the
/// fingerprint non-deterministic.
pub fn parse_issue_datetime(raw: &str) -> Result<NaiveDateTime, FacturaError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        })
        .map_err(|_| {
            FacturaError::Assembly(format!("issue date '{raw}' is not a valid ISO date"))
        })
}

/// One invoice line. Quantities and amounts come from the upstream
/// tax breakdown; the discount and tax fields drive optional blocks
/// in the assembled document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Line discount; emits an allowance block when positive.
    pub discount_amount: Decimal,
    /// Line tax; emits a tax subtotal block when positive.
    pub tax_amount: Decimal,
    /// Net line total (quantity × unit price − discount).
    pub line_extension_amount: Decimal,
    /// Catalog item description, shown on the document.
    pub description: String,
    /// UNECE Rec 20 measurement unit code (e.g. "C62").
    pub unit_code: String,
}

/// Issuing company, read-only input from the company records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    /// Tax id (NIT), possibly with check-digit suffix, e.g. "900123456-7".
    pub nit: String,
    /// Registered legal name.
    pub business_name: String,
    pub city: String,
    pub department: String,
}

/// Buyer party, read-only input from the customer records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buyer {
    /// Identity document type code ("CC", "NIT", ...), used as the
    /// id scheme on the customer party block.
    pub document_type: String,
    pub document_number: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateStatus {
    Valid,
    Revoked,
    Expired,
}

/// Digital certificate owned by an issuing company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalCertificate {
    pub serial_number: String,
    pub issuer: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    /// E.g. "SHA256withRSA".
    pub signature_algorithm: String,
    pub status: CertificateStatus,
    /// Opaque key material consumed by the signing step.
    pub key_material: String,
}

impl DigitalCertificate {
    /// Usable only while marked valid and inside the validity window.
    pub fn is_currently_valid(&self, now: NaiveDateTime) -> bool {
        self.status == CertificateStatus::Valid
            && self.start_date <= now
            && now <= self.end_date
    }
}

/// Certificate metadata captured in the signature provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub serial_number: String,
    pub issuer: String,
    /// X.509-style subject string derived from the company attributes.
    pub subject: String,
    pub algorithm: String,
}

/// Signature provenance, stored separately from the raw XML for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureProvenance {
    /// Base64 signature value.
    pub signature_value: String,
    /// Base64 digest over the canonical unsigned document.
    pub digest_value: String,
    pub certificate: CertificateMetadata,
}

/// Normalized positive response from the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityAcceptance {
    /// Fingerprint echoed by the authority (may be absent in older
    /// gateway versions; the local value is authoritative).
    pub cufe: Option<String>,
    /// Tracking/protocol number assigned by the authority.
    pub protocol_number: Option<String>,
    /// Validation timestamp as reported, kept verbatim.
    pub validation_date: Option<String>,
    pub response_code: String,
    pub response_message: String,
    /// Opaque confirmation blob used to build the verification QR.
    pub confirmation: Option<String>,
}

/// Read-only acceptance state reported by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub cufe: String,
    pub status: AuthorityStatus,
    pub is_valid: bool,
}

/// Outcome of one submission attempt, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttemptVerdict {
    Accepted(AuthorityAcceptance),
    Rejected { code: String, reasons: Vec<String> },
}

/// One immutable row per submission attempt. Never updated in place;
/// the current state of an invoice is its latest record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedDocument {
    pub invoice_id: u64,
    pub cufe: String,
    /// Regenerated per attempt; audit reference only.
    pub correlation_id: String,
    /// Final signed XML exactly as sent.
    pub xml: String,
    /// SHA-256 hex of the final XML.
    pub content_hash: String,
    pub signature: SignatureProvenance,
    pub verdict: AttemptVerdict,
    /// Authority environment the attempt ran against.
    pub environment: String,
}
