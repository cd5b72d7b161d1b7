use thiserror::Error;

/// Errors that can occur while turning an invoice into an
/// authority-accepted electronic document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FacturaError {
    /// Pre-submission gate failure. Collected before any network I/O;
    /// carries every violation found, not just the first.
    #[error("pre-submission validation failed ({} violation(s))", .violations.len())]
    Validation { violations: Vec<ValidationError> },

    /// Data needed to assemble the document is missing or malformed
    /// (including an issue date that cannot be parsed as ISO).
    #[error("document assembly error: {0}")]
    Assembly(String),

    /// No usable certificate, or the signing step itself failed.
    #[error("signature error: {0}")]
    Signature(String),

    /// The signed document failed parse, schema, or structural checks.
    #[error("structural validation failed ({} error(s))", .errors.len())]
    StructuralValidation {
        errors: Vec<String>,
        warnings: Vec<String>,
    },

    /// Retryable network-level failure: connection error, undecodable
    /// response body, or HTTP 5xx, surfaced once the attempt limit is hit.
    #[error("transport error: {0}")]
    Transport(String),

    /// Well-formed negative business response from the authority.
    /// Never retried.
    #[error("rejected by authority (code {code}): {}", .reasons.join("; "))]
    AuthorityRejection { code: String, reasons: Vec<String> },

    /// Local write failure *after* the authority accepted the document.
    /// The acceptance is carried along so it is never lost.
    #[error("document accepted by authority but local persistence failed: {message}")]
    Persistence {
        message: String,
        acceptance: Box<crate::core::AuthorityAcceptance>,
    },
}

/// A single pre-submission validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "buyer.document_number").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
