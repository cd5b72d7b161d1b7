use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::core::SubmittedDocument;

/// Hex SHA-256 over the exact submitted bytes, stored alongside the
/// document so later audits can prove the XML was not rewritten.
pub fn content_hash(xml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(xml.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Append-only archive of submission attempts. Records are immutable
/// once written; corrections happen through new submissions.
pub trait DocumentStore: Send + Sync {
    fn append(&self, record: SubmittedDocument) -> Result<(), String>;

    fn latest_for_invoice(&self, invoice_id: u64) -> Option<SubmittedDocument>;

    fn history_for_invoice(&self, invoice_id: u64) -> Vec<SubmittedDocument>;
}

/// In-process store backed by a vector.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<SubmittedDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn append(&self, record: SubmittedDocument) -> Result<(), String> {
        self.records
            .lock()
            .map_err(|_| "store lock poisoned".to_owned())?
            .push(record);
        Ok(())
    }

    fn latest_for_invoice(&self, invoice_id: u64) -> Option<SubmittedDocument> {
        self.records
            .lock()
            .expect("store lock poisoned")
            .iter()
            .rev()
            .find(|r| r.invoice_id == invoice_id)
            .cloned()
    }

    fn history_for_invoice(&self, invoice_id: u64) -> Vec<SubmittedDocument> {
        self.records
            .lock()
            .expect("store lock poisoned")
            .iter()
            .filter(|r| r.invoice_id == invoice_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AttemptVerdict, AuthorityAcceptance, SignatureProvenance, CertificateMetadata};
    use crate::dian::Environment;

    fn record(invoice_id: u64, correlation: &str) -> SubmittedDocument {
        SubmittedDocument {
            invoice_id,
            cufe: "ABC".into(),
            correlation_id: correlation.into(),
            xml: "<Invoice/>".into(),
            content_hash: content_hash("<Invoice/>"),
            signature: SignatureProvenance {
                signature_value: "sig".into(),
                digest_value: "dig".into(),
                certificate: CertificateMetadata {
                    serial_number: "S1".into(),
                    issuer: "AC".into(),
                    subject: "CN=X".into(),
                    algorithm: "SHA256withRSA".into(),
                },
            },
            verdict: AttemptVerdict::Accepted(AuthorityAcceptance {
                cufe: Some("ABC".into()),
                protocol_number: Some("PRT-1".into()),
                validation_date: None,
                response_code: "00".into(),
                response_message: "ok".into(),
                confirmation: None,
            }),
            environment: Environment::Habilitacion.base_url().into(),
        }
    }

    #[test]
    fn history_preserves_append_order() {
        let store = MemoryStore::new();
        store.append(record(1, "c1")).unwrap();
        store.append(record(2, "c2")).unwrap();
        store.append(record(1, "c3")).unwrap();
        let history = store.history_for_invoice(1);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].correlation_id, "c1");
        assert_eq!(history[1].correlation_id, "c3");
        assert_eq!(store.latest_for_invoice(1).unwrap().correlation_id, "c3");
    }

    #[test]
    fn content_hash_is_stable_and_hex() {
        let h = content_hash("<Invoice/>");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash("<Invoice/>"));
        assert_ne!(h, content_hash("<Invoice />"));
    }
}
