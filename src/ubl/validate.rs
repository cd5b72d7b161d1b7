use quick_xml::Reader;
use quick_xml::events::Event;

/// Elements every DIAN invoice document must contain, matched by
/// local name anywhere in the tree.
const REQUIRED_ELEMENTS: &[&str] = &[
    "Invoice",
    "UBLVersionID",
    "CustomizationID",
    "ProfileID",
    "ID",
    "UUID",
    "IssueDate",
    "IssueTime",
    "InvoiceTypeCode",
    "DocumentCurrencyCode",
    "AccountingSupplierParty",
    "AccountingCustomerParty",
    "LegalMonetaryTotal",
];

/// Outcome of a validation run. Warnings never block submission.
#[derive(Debug, Clone, Default)]
pub struct StructuralReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl StructuralReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Optional schema backend. When none is configured the validator
/// degrades to element-presence checks and says so in a warning.
/// Backends report blocking errors and non-blocking warnings
/// separately; both are merged into the final report.
pub trait SchemaValidator {
    fn validate(&self, xml: &str) -> StructuralReport;
}

pub struct DocumentValidator {
    schema: Option<Box<dyn SchemaValidator + Send + Sync>>,
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentValidator {
    pub fn new() -> Self {
        Self { schema: None }
    }

    pub fn with_schema(schema: Box<dyn SchemaValidator + Send + Sync>) -> Self {
        Self {
            schema: Some(schema),
        }
    }

    /// Runs all stages: well-formedness, schema (or warning), then
    /// required-element and field-shape checks.
    pub fn validate(&self, xml: &str) -> StructuralReport {
        let mut report = StructuralReport::default();

        let scan = match scan_document(xml) {
            Ok(scan) => scan,
            Err(e) => {
                report.errors.push(format!("document is not well-formed XML: {e}"));
                return report;
            }
        };

        match &self.schema {
            Some(schema) => {
                let diagnostics = schema.validate(xml);
                report.errors.extend(diagnostics.errors);
                report.warnings.extend(diagnostics.warnings);
            }
            None => report.warnings.push(
                "no XSD schema configured; performing basic structural validation only".into(),
            ),
        }

        for required in REQUIRED_ELEMENTS {
            if !scan.seen.iter().any(|name| name == required) {
                report
                    .errors
                    .push(format!("required element missing: {required}"));
            }
        }

        if let Some(uuid) = &scan.uuid {
            if uuid.len() < 10 {
                report
                    .errors
                    .push("UUID (CUFE) is too short to be a valid fingerprint".into());
            }
        }
        if let Some(id) = &scan.id {
            if id.trim().is_empty() {
                report.errors.push("document ID is empty".into());
            }
        }
        if let Some(date) = &scan.issue_date {
            if !is_iso_date(date) {
                report
                    .errors
                    .push(format!("IssueDate '{date}' is not in YYYY-MM-DD format"));
            }
        }

        report
    }
}

struct DocumentScan {
    seen: Vec<String>,
    uuid: Option<String>,
    id: Option<String>,
    issue_date: Option<String>,
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

/// One pass over the document collecting element local names and the
/// first occurrence of the identity fields. Any parse error aborts.
fn scan_document(xml: &str) -> Result<DocumentScan, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut scan = DocumentScan {
        seen: Vec::new(),
        uuid: None,
        id: None,
        issue_date: None,
    };
    let mut capture: Option<&'static str> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = local_name(e.name().as_ref());
                capture = match name.as_str() {
                    "UUID" if scan.uuid.is_none() => Some("UUID"),
                    "ID" if scan.id.is_none() => Some("ID"),
                    "IssueDate" if scan.issue_date.is_none() => Some("IssueDate"),
                    _ => None,
                };
                if !scan.seen.contains(&name) {
                    scan.seen.push(name);
                }
            }
            Event::Text(t) => {
                if let Some(field) = capture.take() {
                    let text = t.unescape()?.into_owned();
                    match field {
                        "UUID" => scan.uuid = Some(text),
                        "ID" => scan.id = Some(text),
                        "IssueDate" => scan.issue_date = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(_) => capture = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(scan)
}

fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit())
}

/// Cheap well-formedness check, used on downloaded receipts.
pub fn is_well_formed(xml: &str) -> bool {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_date_shape() {
        assert!(is_iso_date("2025-01-15"));
        assert!(!is_iso_date("15/01/2025"));
        assert!(!is_iso_date("2025-1-15"));
        assert!(!is_iso_date("2025-01-15T00:00:00"));
    }

    #[test]
    fn malformed_xml_stops_at_stage_one() {
        let report = DocumentValidator::new().validate("<Invoice><cbc:ID>x</Invoice>");
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("not well-formed"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_schema_is_a_warning_not_an_error() {
        let xml = r#"<?xml version="1.0"?><Invoice/>"#;
        let report = DocumentValidator::new().validate(xml);
        assert!(report.warnings.iter().any(|w| w.contains("no XSD schema")));
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn missing_customer_party_is_named_in_the_errors() {
        let xml = r#"<?xml version="1.0"?>
<Invoice>
  <cbc:UBLVersionID>UBL 2.1</cbc:UBLVersionID>
  <cbc:CustomizationID>DIAN 2.1: Factura Electrónica de Venta</cbc:CustomizationID>
  <cbc:ProfileID>DIAN 2.1</cbc:ProfileID>
  <cbc:ID>FAC-1</cbc:ID>
  <cbc:UUID>ABCDEF0123456789</cbc:UUID>
  <cbc:IssueDate>2025-01-15</cbc:IssueDate>
  <cbc:IssueTime>10:30:00</cbc:IssueTime>
  <cbc:InvoiceTypeCode>01</cbc:InvoiceTypeCode>
  <cbc:DocumentCurrencyCode>COP</cbc:DocumentCurrencyCode>
  <cac:AccountingSupplierParty/>
  <cac:LegalMonetaryTotal/>
</Invoice>"#;
        let report = DocumentValidator::new().validate(xml);
        assert_eq!(
            report.errors,
            vec!["required element missing: AccountingCustomerParty".to_string()]
        );
    }

    #[test]
    fn short_uuid_is_flagged() {
        let xml = r#"<Invoice><cbc:UUID>ABC</cbc:UUID></Invoice>"#;
        let report = DocumentValidator::new().validate(xml);
        assert!(report.errors.iter().any(|e| e.contains("too short")));
    }

    struct RejectAll;
    impl SchemaValidator for RejectAll {
        fn validate(&self, _xml: &str) -> StructuralReport {
            StructuralReport {
                errors: vec!["schema says no".into()],
                warnings: vec![],
            }
        }
    }

    #[test]
    fn schema_errors_are_surfaced() {
        let report =
            DocumentValidator::with_schema(Box::new(RejectAll)).validate("<Invoice/>");
        assert!(report.errors.iter().any(|e| e == "schema says no"));
        assert!(report.warnings.is_empty());
    }

    struct Advisory;
    impl SchemaValidator for Advisory {
        fn validate(&self, _xml: &str) -> StructuralReport {
            StructuralReport {
                errors: vec![],
                warnings: vec!["element UBLVersionID is deprecated here".into()],
            }
        }
    }

    #[test]
    fn schema_warnings_never_block_a_document() {
        let xml = r#"<?xml version="1.0"?>
<Invoice>
  <cbc:UBLVersionID>UBL 2.1</cbc:UBLVersionID>
  <cbc:CustomizationID>DIAN 2.1: Factura Electrónica de Venta</cbc:CustomizationID>
  <cbc:ProfileID>DIAN 2.1</cbc:ProfileID>
  <cbc:ID>FAC-1</cbc:ID>
  <cbc:UUID>ABCDEF0123456789</cbc:UUID>
  <cbc:IssueDate>2025-01-15</cbc:IssueDate>
  <cbc:IssueTime>10:30:00</cbc:IssueTime>
  <cbc:InvoiceTypeCode>01</cbc:InvoiceTypeCode>
  <cbc:DocumentCurrencyCode>COP</cbc:DocumentCurrencyCode>
  <cac:AccountingSupplierParty/>
  <cac:AccountingCustomerParty/>
  <cac:LegalMonetaryTotal/>
</Invoice>"#;
        let report = DocumentValidator::with_schema(Box::new(Advisory)).validate(xml);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("deprecated")));
    }

    #[test]
    fn well_formedness_check_requires_balanced_tags() {
        assert!(is_well_formed("<a><b>x</b></a>"));
        assert!(!is_well_formed("<a><b>x</a>"));
    }
}
