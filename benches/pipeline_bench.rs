use criterion::{Criterion, black_box, criterion_group, criterion_main};

use facturacol::core::{
    AuthorityStatus, Buyer, Company, CufeInputs, InternalStatus, Invoice, LineItem, generate_cufe,
};
use facturacol::ubl::{DocumentContext, to_ubl_xml};
use rust_decimal_macros::dec;

fn sample_invoice(lines: usize) -> Invoice {
    Invoice {
        id: 1,
        invoice_number: Some("FAC-1042".into()),
        issue_date: Some("2025-01-15 10:30:00".into()),
        type_code: "01".into(),
        currency_code: "COP".into(),
        line_extension_amount: dec!(100000),
        tax_exclusive_amount: dec!(100000),
        tax_inclusive_amount: dec!(119000),
        payable_amount: dec!(119000),
        internal_status: InternalStatus::Issued,
        authority_status: AuthorityStatus::Pending,
        cufe: None,
        lines: (0..lines)
            .map(|i| LineItem {
                quantity: dec!(2),
                unit_price: dec!(50000),
                discount_amount: dec!(0),
                tax_amount: dec!(19000),
                line_extension_amount: dec!(100000),
                description: format!("Artículo {i}"),
                unit_code: "EA".into(),
            })
            .collect(),
    }
}

fn bench_cufe(c: &mut Criterion) {
    let inputs = CufeInputs {
        issuer_tax_id: "900123456-7",
        invoice_number: "FAC-1042",
        issue_date: "2025-01-15 10:30:00",
        payable_amount: dec!(119000),
        tax_amount: dec!(19000),
        type_code: "01",
        currency_code: "COP",
    };
    c.bench_function("cufe_generation", |b| {
        b.iter(|| generate_cufe(black_box(&inputs)).unwrap())
    });
}

fn bench_assembly(c: &mut Criterion) {
    let issuer = Company {
        nit: "900123456-7".into(),
        business_name: "Comercial Andina SAS".into(),
        city: "Bogotá".into(),
        department: "Cundinamarca".into(),
    };
    let buyer = Buyer {
        document_type: "31".into(),
        document_number: "800987654-1".into(),
        name: "Distribuciones del Valle".into(),
    };
    let ctx = DocumentContext {
        issuer: &issuer,
        buyer: &buyer,
        cufe: "ABCDEF0123456789ABCDEF0123456789",
        standard_rate: dec!(19),
    };

    let mut group = c.benchmark_group("ubl_assembly");
    for lines in [1usize, 10, 100] {
        let invoice = sample_invoice(lines);
        group.bench_function(format!("{lines}_lines"), |b| {
            b.iter(|| to_ubl_xml(black_box(&invoice), black_box(&ctx), None).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cufe, bench_assembly);
criterion_main!(benches);
