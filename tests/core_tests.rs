use chrono::{NaiveDate, NaiveDateTime};
use facturacol::core::{
    AuthorityStatus, Buyer, CertificateStatus, Company, CufeInputs, DigitalCertificate,
    InternalStatus, Invoice, LineItem, NumberAllocator, NumberingRange, generate_cufe,
    validate_before_submission,
};
use rust_decimal_macros::dec;

fn seller() -> Company {
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

fn range() -> NumberingRange {
    NumberingRange {
        prefix: "FAC-".into(),
        start_number: 1,
        end_number: 5000,
        validity_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        validity_end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        active: true,
        document_type: "01".into(),
    }
}

fn invoice() -> Invoice {
    Invoice {
        id: 1,
        invoice_number: Some("FAC-42".into()),
        issue_date: Some("2025-01-15 10:30:00".into()),
        type_code: "01".into(),
        currency_code: "COP".into(),
        line_extension_amount: dec!(100000),
        tax_exclusive_amount: dec!(100000),
        tax_inclusive_amount: dec!(119000),
        payable_amount: dec!(119000),
        internal_status: InternalStatus::Draft,
        authority_status: AuthorityStatus::Pending,
        cufe: None,
        lines: vec![LineItem {
            quantity: dec!(2),
            unit_price: dec!(50000),
            discount_amount: dec!(0),
            tax_amount: dec!(19000),
            line_extension_amount: dec!(100000),
            description: "Servicio de soporte".into(),
            unit_code: "EA".into(),
        }],
    }
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 15)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

#[test]
fn complete_invoice_passes_the_gate() {
    let violations = validate_before_submission(
        &invoice(),
        &seller(),
        &buyer(),
        Some(&certificate()),
        Some(&range()),
        now(),
    );
    assert!(violations.is_empty(), "unexpected: {violations:?}");
}

#[test]
fn gate_collects_every_violation_instead_of_stopping() {
    let mut inv = invoice();
    inv.invoice_number = None;
    inv.payable_amount = dec!(0);
    inv.lines.clear();
    let violations =
        validate_before_submission(&inv, &seller(), &buyer(), None, None, now());
    let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
    assert!(fields.contains(&"invoice_number"));
    assert!(fields.contains(&"payable_amount"));
    assert!(fields.contains(&"lines"));
    assert!(fields.contains(&"issuer.certificate"));
    assert!(fields.contains(&"numbering"));
    assert!(violations.len() >= 5);
}

#[test]
fn gate_rejects_expired_numbering_range() {
    let violations = validate_before_submission(
        &invoice(),
        &seller(),
        &buyer(),
        Some(&certificate()),
        Some(&range()),
        NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap(),
    );
    assert!(violations.iter().any(|v| v.field == "numbering.validity"));
}

#[test]
fn gate_rejects_an_expired_certificate() {
    let mut cert = certificate();
    cert.end_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().into();
    let violations = validate_before_submission(
        &invoice(),
        &seller(),
        &buyer(),
        Some(&cert),
        Some(&range()),
        now(),
    );
    assert!(violations.iter().any(|v| v.field == "issuer.certificate"));
}

#[test]
fn gate_rejects_a_revoked_certificate() {
    let mut cert = certificate();
    cert.status = CertificateStatus::Revoked;
    let violations = validate_before_submission(
        &invoice(),
        &seller(),
        &buyer(),
        Some(&cert),
        Some(&range()),
        now(),
    );
    assert!(violations.iter().any(|v| v.field == "issuer.certificate"));
}

#[test]
fn gate_rejects_nonpositive_line_quantities() {
    let mut inv = invoice();
    inv.lines[0].quantity = dec!(0);
    let violations = validate_before_submission(
        &inv,
        &seller(),
        &buyer(),
        Some(&certificate()),
        Some(&range()),
        now(),
    );
    assert!(violations.iter().any(|v| v.field == "lines.quantity"));
}

#[test]
fn gate_rejects_inverted_totals() {
    let mut inv = invoice();
    inv.tax_inclusive_amount = dec!(90000);
    let violations = validate_before_submission(
        &inv,
        &seller(),
        &buyer(),
        Some(&certificate()),
        Some(&range()),
        now(),
    );
    assert!(violations.iter().any(|v| v.field == "tax_inclusive_amount"));
}

#[test]
fn cufe_ignores_tax_id_formatting() {
    let base = CufeInputs {
        issuer_tax_id: "900123456-7",
        invoice_number: "FAC-42",
        issue_date: "2025-01-15 10:30:00",
        payable_amount: dec!(119000),
        tax_amount: dec!(19000),
        type_code: "01",
        currency_code: "COP",
    };
    let formatted = generate_cufe(&base).unwrap();
    let plain = generate_cufe(&CufeInputs {
        issuer_tax_id: "9001234567",
        ..base
    })
    .unwrap();
    assert_eq!(formatted, plain);
}

#[test]
fn allocator_hands_out_formatted_numbers_until_exhaustion() {
    let mut r = range();
    r.end_number = 3;
    let allocator = NumberAllocator::new(r);
    assert_eq!(allocator.allocate().as_deref(), Some("FAC-1"));
    assert_eq!(allocator.allocate().as_deref(), Some("FAC-2"));
    assert_eq!(allocator.allocate().as_deref(), Some("FAC-3"));
    assert_eq!(allocator.allocate(), None);
    assert_eq!(allocator.remaining(), 0);
}

#[test]
fn allocator_can_resume_mid_range() {
    let allocator = NumberAllocator::resuming_at(range(), 100);
    assert_eq!(allocator.allocate().as_deref(), Some("FAC-100"));
}
