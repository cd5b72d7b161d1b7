use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info};

use crate::core::{
    AttemptVerdict, AuthorityStatus, Buyer, Company, CufeInputs, DigitalCertificate, FacturaError,
    InternalStatus, Invoice, NumberingRange, SubmittedDocument, ValidationError,
    generate_cufe, new_correlation_id, validate_before_submission,
};
use crate::ubl::{DocumentContext, DocumentValidator, sign_document};

use super::client::AuthorityClient;
use super::qr::qr_url;
use super::retry::RetryBudget;
use super::store::{DocumentStore, content_hash};
use super::Environment;

/// Provider of the currently active signing certificate. Read fresh
/// on every submission so rotations take effect immediately.
pub trait CertificateSource: Send + Sync {
    fn active_certificate(&self) -> Option<DigitalCertificate>;
}

/// Provider of the currently authorized numbering range.
pub trait NumberingSource: Send + Sync {
    fn active_range(&self) -> Option<NumberingRange>;
}

/// What the caller gets back after a successful submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub cufe: String,
    pub correlation_id: String,
    pub protocol_number: Option<String>,
    pub validation_date: Option<String>,
    pub response_code: String,
    pub response_message: String,
    pub confirmation: Option<String>,
    pub qr_url: String,
}

/// End-to-end submission orchestrator: gate, fingerprint, assembly,
/// signature, structural validation, authority exchange, archival.
/// Generic over the authority so the simulator slots in unchanged.
pub struct Pipeline<A: AuthorityClient> {
    authority: A,
    store: Arc<dyn DocumentStore>,
    certificates: Box<dyn CertificateSource>,
    numbering: Box<dyn NumberingSource>,
    validator: DocumentValidator,
    environment: Environment,
    standard_rate: Decimal,
}

impl<A: AuthorityClient> Pipeline<A> {
    pub fn new(
        authority: A,
        store: Arc<dyn DocumentStore>,
        certificates: Box<dyn CertificateSource>,
        numbering: Box<dyn NumberingSource>,
        environment: Environment,
    ) -> Self {
        Self {
            authority,
            store,
            certificates,
            numbering,
            validator: DocumentValidator::new(),
            environment,
            standard_rate: dec!(19),
        }
    }

    pub fn with_validator(mut self, validator: DocumentValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Runs the full submission for one invoice. On success the
    /// invoice ends `Issued`/`Accepted` with its CUFE recorded; on
    /// any failure, gate, assembly, signature, structural, transport
    /// or authority rejection, it ends `Rejected` with no fingerprint.
    pub fn submit(
        &self,
        invoice: &mut Invoice,
        issuer: &Company,
        buyer: &Buyer,
        now: NaiveDateTime,
        budget: &RetryBudget,
    ) -> Result<SubmissionOutcome, FacturaError> {
        let correlation_id = new_correlation_id();
        invoice.internal_status = InternalStatus::Issued;
        invoice.authority_status = AuthorityStatus::Pending;

        let certificate = self.certificates.active_certificate();
        let range = self.numbering.active_range();
        let violations = validate_before_submission(
            invoice,
            issuer,
            buyer,
            certificate.as_ref(),
            range.as_ref(),
            now,
        );
        if !violations.is_empty() {
            invoice.authority_status = AuthorityStatus::Rejected;
            return Err(FacturaError::Validation { violations });
        }
        // The gate guarantees these.
        let certificate = certificate
            .ok_or_else(|| FacturaError::Signature("no active certificate".into()));
        let certificate = rejected_on_failure(invoice, certificate)?;
        let number = invoice
            .invoice_number
            .clone()
            .ok_or_else(|| FacturaError::Assembly("invoice has no assigned number".into()));
        let number = rejected_on_failure(invoice, number)?;
        let issue_date = invoice
            .issue_date
            .clone()
            .ok_or_else(|| FacturaError::Assembly("invoice has no issue date".into()));
        let issue_date = rejected_on_failure(invoice, issue_date)?;

        let cufe = generate_cufe(&CufeInputs {
            issuer_tax_id: &issuer.nit,
            invoice_number: &number,
            issue_date: &issue_date,
            payable_amount: invoice.payable_amount,
            tax_amount: invoice.tax_total(),
            type_code: &invoice.type_code,
            currency_code: &invoice.currency_code,
        });
        let cufe = rejected_on_failure(invoice, cufe)?;

        let ctx = DocumentContext {
            issuer,
            buyer,
            cufe: &cufe,
            standard_rate: self.standard_rate,
        };
        let signed = sign_document(invoice, &ctx, &certificate, now);
        let signed = rejected_on_failure(invoice, signed)?;

        let report = self.validator.validate(&signed.xml);
        if !report.is_valid() {
            invoice.authority_status = AuthorityStatus::Rejected;
            return Err(FacturaError::StructuralValidation {
                errors: report.errors,
                warnings: report.warnings,
            });
        }

        info!(
            invoice = invoice.id,
            number = %number,
            correlation = %correlation_id,
            "submitting document"
        );
        let verdict = self.authority.submit_document(&signed.xml, budget);
        let verdict = rejected_on_failure(invoice, verdict)?;

        let record = SubmittedDocument {
            invoice_id: invoice.id,
            cufe: cufe.clone(),
            correlation_id: correlation_id.clone(),
            content_hash: content_hash(&signed.xml),
            xml: signed.xml,
            signature: signed.provenance,
            verdict: verdict.clone(),
            environment: self.environment.base_url().to_owned(),
        };
        let stored = self.store.append(record);

        match verdict {
            AttemptVerdict::Rejected { code, reasons } => {
                invoice.authority_status = AuthorityStatus::Rejected;
                if let Err(message) = stored {
                    error!(invoice = invoice.id, %message, "failed to archive rejected attempt");
                }
                Err(FacturaError::AuthorityRejection { code, reasons })
            }
            AttemptVerdict::Accepted(acceptance) => {
                // The authority's acceptance stands even if our own
                // archive write fails; the caller learns both facts.
                invoice.authority_status = AuthorityStatus::Accepted;
                invoice.cufe = Some(cufe.clone());
                if let Err(message) = stored {
                    error!(invoice = invoice.id, %message, "accepted document could not be archived");
                    return Err(FacturaError::Persistence {
                        message,
                        acceptance: Box::new(acceptance),
                    });
                }
                let qr_url = qr_url(invoice, issuer, &buyer.document_number, &cufe, self.environment)?;
                Ok(SubmissionOutcome {
                    cufe: acceptance.cufe.unwrap_or(cufe),
                    correlation_id,
                    protocol_number: acceptance.protocol_number,
                    validation_date: acceptance.validation_date,
                    response_code: acceptance.response_code,
                    response_message: acceptance.response_message,
                    confirmation: acceptance.confirmation,
                    qr_url,
                })
            }
        }
    }

    /// Refreshes the invoice's authority status from the service.
    /// A locally cancelled invoice is never resurrected.
    pub fn reconcile(
        &self,
        invoice: &mut Invoice,
        budget: &RetryBudget,
    ) -> Result<AuthorityStatus, FacturaError> {
        let cufe = invoice.cufe.clone().ok_or_else(|| {
            FacturaError::Validation {
                violations: vec![ValidationError::new(
                    "cufe",
                    "invoice has never been submitted; nothing to reconcile",
                )],
            }
        })?;
        let status = self.authority.document_status(&cufe, budget)?;
        if invoice.internal_status != InternalStatus::Cancelled {
            if status.is_valid {
                invoice.authority_status = AuthorityStatus::Accepted;
            } else if status.status == AuthorityStatus::Rejected {
                invoice.authority_status = AuthorityStatus::Rejected;
            }
        }
        Ok(invoice.authority_status)
    }

    /// Raw status query, without touching any invoice.
    pub fn check_status(
        &self,
        cufe: &str,
        budget: &RetryBudget,
    ) -> Result<crate::core::DocumentStatus, FacturaError> {
        self.authority.document_status(cufe, budget)
    }

    /// Cancels an invoice locally. Refused once the authority has
    /// accepted the document; accepted documents require a credit
    /// note, not a cancellation.
    pub fn cancel(&self, invoice: &mut Invoice) -> Result<(), FacturaError> {
        if invoice.authority_status == AuthorityStatus::Accepted {
            return Err(FacturaError::Validation {
                violations: vec![ValidationError::new(
                    "authority_status",
                    "an accepted document cannot be cancelled",
                )],
            });
        }
        invoice.internal_status = InternalStatus::Cancelled;
        invoice.authority_status = AuthorityStatus::Cancelled;
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }
}

/// Marks the invoice rejected before a failure propagates, so a
/// caller never observes a failed submission still pending.
fn rejected_on_failure<T>(
    invoice: &mut Invoice,
    result: Result<T, FacturaError>,
) -> Result<T, FacturaError> {
    if result.is_err() {
        invoice.authority_status = AuthorityStatus::Rejected;
    }
    result
}
