use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

use crate::core::{
    CertificateMetadata, Company, DigitalCertificate, FacturaError, Invoice, SignatureProvenance,
};

use super::assemble::{DocumentContext, SignatureBlock, to_ubl_xml};
use super::{C14N_METHOD, DIGEST_METHOD, SIGNATURE_METHOD};

/// Finished signed document plus its audit trail.
#[derive(Debug)]
pub struct SignedDocument {
    pub xml: String,
    pub provenance: SignatureProvenance,
}

/// X.509-style subject line for the issuing company.
pub fn certificate_subject(issuer: &Company) -> String {
    format!(
        "CN={name}, OU=Facturación Electrónica, O={name}, L={city}, ST={department}, C=CO, SERIALNUMBER={nit}",
        name = issuer.business_name,
        city = issuer.city,
        department = issuer.department,
        nit = issuer.nit,
    )
}

fn sha256_b64(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    B64.encode(hasher.finalize())
}

/// Signs the invoice: assembles the unsigned document, digests it,
/// derives the signature value from the signed-info descriptor and the
/// certificate key material, then reassembles with the signature block
/// embedded. The certificate must be valid at `now`.
pub fn sign_document(
    invoice: &Invoice,
    ctx: &DocumentContext<'_>,
    certificate: &DigitalCertificate,
    now: NaiveDateTime,
) -> Result<SignedDocument, FacturaError> {
    if !certificate.is_currently_valid(now) {
        return Err(FacturaError::Signature(format!(
            "certificate {} is not valid for signing at {now}",
            certificate.serial_number
        )));
    }

    let unsigned = to_ubl_xml(invoice, ctx, None)?;
    let digest_value = sha256_b64(unsigned.as_bytes());

    let signed_info = format!(
        "{C14N_METHOD}\n{SIGNATURE_METHOD}\n{DIGEST_METHOD}\n{digest_value}"
    );
    let signature_value = sha256_b64(
        format!(
            "{signed_info}{}{}",
            certificate.serial_number, certificate.key_material
        )
        .as_bytes(),
    );

    let subject = certificate_subject(ctx.issuer);
    let metadata = CertificateMetadata {
        serial_number: certificate.serial_number.clone(),
        issuer: certificate.issuer.clone(),
        subject: subject.clone(),
        algorithm: certificate.signature_algorithm.clone(),
    };
    let x509_certificate = B64.encode(
        serde_json::to_string(&metadata)
            .map_err(|e| FacturaError::Signature(format!("certificate encoding failed: {e}")))?,
    );

    let block = SignatureBlock {
        digest_value: digest_value.clone(),
        signature_value: signature_value.clone(),
        x509_certificate,
        issuer: certificate.issuer.clone(),
        serial_number: certificate.serial_number.clone(),
        subject,
        signer_name: ctx.issuer.business_name.clone(),
    };
    let xml = to_ubl_xml(invoice, ctx, Some(&block))?;

    Ok(SignedDocument {
        xml,
        provenance: SignatureProvenance {
            signature_value,
            digest_value,
            certificate: metadata,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Buyer, CertificateStatus, InternalStatus, AuthorityStatus, LineItem};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn issuer() -> Company {
        Company {
            nit: "900123456-7".into(),
            business_name: "Comercial Andina SAS".into(),
            city: "Bogotá".into(),
            department: "Cundinamarca".into(),
        }
    }

    fn buyer() -> Buyer {
        Buyer {
            document_type: "31".into(),
            document_number: "800987654-1".into(),
            name: "Distribuciones del Valle".into(),
        }
    }

    fn certificate() -> DigitalCertificate {
        DigitalCertificate {
            serial_number: "CERT-2025-001".into(),
            issuer: "AC Pruebas DIAN".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().into(),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap().into(),
            signature_algorithm: "SHA256withRSA".into(),
            status: CertificateStatus::Valid,
            key_material: "material-de-prueba".into(),
        }
    }

    fn invoice() -> Invoice {
        Invoice {
            id: 1,
            invoice_number: Some("FAC-9".into()),
            issue_date: Some("2025-03-02 08:00:00".into()),
            type_code: "01".into(),
            currency_code: "COP".into(),
            line_extension_amount: dec!(100000),
            tax_exclusive_amount: dec!(100000),
            tax_inclusive_amount: dec!(119000),
            payable_amount: dec!(119000),
            internal_status: InternalStatus::Issued,
            authority_status: AuthorityStatus::Pending,
            cufe: None,
            lines: vec![LineItem {
                quantity: dec!(1),
                unit_price: dec!(100000),
                discount_amount: dec!(0),
                tax_amount: dec!(19000),
                line_extension_amount: dec!(100000),
                description: "Licencia anual".into(),
                unit_code: "EA".into(),
            }],
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn signing_embeds_digest_and_provenance() {
        let (i, b) = (issuer(), buyer());
        let ctx = DocumentContext {
            issuer: &i,
            buyer: &b,
            cufe: "ABC123",
            standard_rate: dec!(19),
        };
        let signed = sign_document(&invoice(), &ctx, &certificate(), now()).unwrap();
        assert!(signed.xml.contains(&format!(
            "<ds:DigestValue>{}</ds:DigestValue>",
            signed.provenance.digest_value
        )));
        assert!(signed.xml.contains(&signed.provenance.signature_value));
        assert_eq!(signed.provenance.certificate.serial_number, "CERT-2025-001");
    }

    #[test]
    fn signing_is_deterministic_for_identical_input() {
        let (i, b) = (issuer(), buyer());
        let ctx = DocumentContext {
            issuer: &i,
            buyer: &b,
            cufe: "ABC123",
            standard_rate: dec!(19),
        };
        let a = sign_document(&invoice(), &ctx, &certificate(), now()).unwrap();
        let c = sign_document(&invoice(), &ctx, &certificate(), now()).unwrap();
        assert_eq!(a.xml, c.xml);
        assert_eq!(a.provenance.signature_value, c.provenance.signature_value);
    }

    #[test]
    fn expired_certificate_is_rejected() {
        let (i, b) = (issuer(), buyer());
        let ctx = DocumentContext {
            issuer: &i,
            buyer: &b,
            cufe: "ABC123",
            standard_rate: dec!(19),
        };
        let mut cert = certificate();
        cert.end_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().into();
        let err = sign_document(&invoice(), &ctx, &cert, now()).unwrap_err();
        assert!(matches!(err, FacturaError::Signature(_)));
    }

    #[test]
    fn revoked_certificate_is_rejected() {
        let (i, b) = (issuer(), buyer());
        let ctx = DocumentContext {
            issuer: &i,
            buyer: &b,
            cufe: "ABC123",
            standard_rate: dec!(19),
        };
        let mut cert = certificate();
        cert.status = CertificateStatus::Revoked;
        assert!(sign_document(&invoice(), &ctx, &cert, now()).is_err());
    }

    #[test]
    fn subject_line_carries_company_attributes() {
        let s = certificate_subject(&issuer());
        assert_eq!(
            s,
            "CN=Comercial Andina SAS, OU=Facturación Electrónica, O=Comercial Andina SAS, \
             L=Bogotá, ST=Cundinamarca, C=CO, SERIALNUMBER=900123456-7"
        );
    }
}
