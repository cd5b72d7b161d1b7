use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

use crate::core::{Buyer, Company, FacturaError, Invoice, format_fixed2};

use super::xml_utils::XmlWriter;
use super::{
    C14N_METHOD, CUFE_SCHEME_ID, CUSTOMIZATION_ID, DIGEST_METHOD, ENVELOPED_TRANSFORM,
    IVA_SCHEME_ID, IVA_SCHEME_NAME, NS_CAC, NS_CBC, NS_DS, NS_EXT, NS_INVOICE, PROFILE_ID,
    SIGNATURE_METHOD, SUPPLIER_ID_SCHEME, UBL_VERSION,
};

/// Parties and fingerprint surrounding a single assembly run. The
/// assembler itself is stateless; everything it needs arrives here.
pub struct DocumentContext<'a> {
    pub issuer: &'a Company,
    pub buyer: &'a Buyer,
    pub cufe: &'a str,
    /// VAT percentage written when a tax subtotal has a zero base.
    pub standard_rate: Decimal,
}

/// Materialized signature content, embedded as the first children of
/// the root element when present.
pub struct SignatureBlock {
    pub digest_value: String,
    pub signature_value: String,
    pub x509_certificate: String,
    pub issuer: String,
    pub serial_number: String,
    pub subject: String,
    pub signer_name: String,
}

/// Builds the complete UBL 2.1 invoice document. Pass `None` for the
/// signature to produce the unsigned form whose digest feeds signing.
pub fn to_ubl_xml(
    invoice: &Invoice,
    ctx: &DocumentContext<'_>,
    signature: Option<&SignatureBlock>,
) -> Result<String, FacturaError> {
    let number = invoice
        .invoice_number
        .as_deref()
        .ok_or_else(|| FacturaError::Assembly("invoice has no assigned number".into()))?;
    let issued = invoice.issue_datetime()?;

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "Invoice",
        &[
            ("xmlns", NS_INVOICE),
            ("xmlns:cac", NS_CAC),
            ("xmlns:cbc", NS_CBC),
            ("xmlns:ext", NS_EXT),
            ("xmlns:ds", NS_DS),
        ],
    )?;

    if let Some(sig) = signature {
        write_extensions(&mut w, sig)?;
        write_signature_reference(&mut w, sig)?;
    }

    w.text_element("cbc:UBLVersionID", UBL_VERSION)?;
    w.text_element("cbc:CustomizationID", CUSTOMIZATION_ID)?;
    w.text_element("cbc:ProfileID", PROFILE_ID)?;
    w.text_element("cbc:ID", number)?;
    w.text_element_with_attrs("cbc:UUID", ctx.cufe, &[("schemeID", CUFE_SCHEME_ID)])?;
    w.text_element("cbc:IssueDate", &issued.format("%Y-%m-%d").to_string())?;
    w.text_element("cbc:IssueTime", &issued.format("%H:%M:%S").to_string())?;
    w.text_element("cbc:InvoiceTypeCode", &invoice.type_code)?;
    w.text_element("cbc:DocumentCurrencyCode", &invoice.currency_code)?;
    w.text_element("cbc:LineCountNumeric", &invoice.lines.len().to_string())?;

    write_supplier(&mut w, ctx.issuer)?;
    write_customer(&mut w, ctx.buyer)?;
    write_tax_total(&mut w, invoice, ctx.standard_rate)?;
    write_monetary_total(&mut w, invoice)?;

    for (idx, line) in invoice.lines.iter().enumerate() {
        write_line(&mut w, invoice, idx + 1, line, ctx.standard_rate)?;
    }

    w.end_element("Invoice")?;
    w.into_string()
}

fn write_extensions(w: &mut XmlWriter, sig: &SignatureBlock) -> Result<(), FacturaError> {
    w.start_element("ext:UBLExtensions")?;
    w.start_element("ext:UBLExtension")?;
    w.start_element("ext:ExtensionContent")?;
    w.start_element_with_attrs("ds:Signature", &[("Id", "signature")])?;

    w.start_element("ds:SignedInfo")?;
    w.start_element_with_attrs("ds:CanonicalizationMethod", &[("Algorithm", C14N_METHOD)])?;
    w.end_element("ds:CanonicalizationMethod")?;
    w.start_element_with_attrs("ds:SignatureMethod", &[("Algorithm", SIGNATURE_METHOD)])?;
    w.end_element("ds:SignatureMethod")?;
    w.start_element_with_attrs("ds:Reference", &[("URI", "")])?;
    w.start_element("ds:Transforms")?;
    w.start_element_with_attrs("ds:Transform", &[("Algorithm", ENVELOPED_TRANSFORM)])?;
    w.end_element("ds:Transform")?;
    w.end_element("ds:Transforms")?;
    w.start_element_with_attrs("ds:DigestMethod", &[("Algorithm", DIGEST_METHOD)])?;
    w.end_element("ds:DigestMethod")?;
    w.text_element("ds:DigestValue", &sig.digest_value)?;
    w.end_element("ds:Reference")?;
    w.end_element("ds:SignedInfo")?;

    w.text_element("ds:SignatureValue", &sig.signature_value)?;

    w.start_element("ds:KeyInfo")?;
    w.start_element("ds:X509Data")?;
    w.text_element("ds:X509Certificate", &sig.x509_certificate)?;
    w.text_element("ds:X509IssuerName", &sig.issuer)?;
    w.text_element("ds:X509SerialNumber", &sig.serial_number)?;
    w.text_element("ds:X509SubjectName", &sig.subject)?;
    w.end_element("ds:X509Data")?;
    w.end_element("ds:KeyInfo")?;

    w.end_element("ds:Signature")?;
    w.end_element("ext:ExtensionContent")?;
    w.end_element("ext:UBLExtension")?;
    w.end_element("ext:UBLExtensions")?;
    Ok(())
}

fn write_signature_reference(w: &mut XmlWriter, sig: &SignatureBlock) -> Result<(), FacturaError> {
    w.start_element("cac:Signature")?;
    w.text_element("cbc:ID", &sig.serial_number)?;
    w.start_element("cac:SignatoryParty")?;
    w.start_element("cac:PartyName")?;
    w.text_element("cbc:Name", &sig.signer_name)?;
    w.end_element("cac:PartyName")?;
    w.end_element("cac:SignatoryParty")?;
    w.start_element("cac:DigitalSignatureAttachment")?;
    w.start_element("cac:ExternalReference")?;
    w.text_element("cbc:URI", "#signature")?;
    w.end_element("cac:ExternalReference")?;
    w.end_element("cac:DigitalSignatureAttachment")?;
    w.end_element("cac:Signature")?;
    Ok(())
}

fn write_supplier(w: &mut XmlWriter, issuer: &Company) -> Result<(), FacturaError> {
    w.start_element("cac:AccountingSupplierParty")?;
    w.start_element("cac:Party")?;
    w.start_element("cac:PartyIdentification")?;
    w.text_element_with_attrs("cbc:ID", &issuer.nit, &[("schemeID", SUPPLIER_ID_SCHEME)])?;
    w.end_element("cac:PartyIdentification")?;
    w.start_element("cac:PartyName")?;
    w.text_element("cbc:Name", &issuer.business_name)?;
    w.end_element("cac:PartyName")?;
    w.start_element("cac:PhysicalLocation")?;
    w.start_element("cac:Address")?;
    w.text_element("cbc:CityName", &issuer.city)?;
    w.text_element("cbc:CountrySubentity", &issuer.department)?;
    w.start_element("cac:Country")?;
    w.text_element("cbc:IdentificationCode", "CO")?;
    w.end_element("cac:Country")?;
    w.end_element("cac:Address")?;
    w.end_element("cac:PhysicalLocation")?;
    w.start_element("cac:PartyLegalEntity")?;
    w.text_element("cbc:RegistrationName", &issuer.business_name)?;
    w.end_element("cac:PartyLegalEntity")?;
    w.end_element("cac:Party")?;
    w.end_element("cac:AccountingSupplierParty")?;
    Ok(())
}

fn write_customer(w: &mut XmlWriter, buyer: &Buyer) -> Result<(), FacturaError> {
    w.start_element("cac:AccountingCustomerParty")?;
    w.start_element("cac:Party")?;
    w.start_element("cac:PartyIdentification")?;
    w.text_element_with_attrs(
        "cbc:ID",
        &buyer.document_number,
        &[("schemeID", &buyer.document_type)],
    )?;
    w.end_element("cac:PartyIdentification")?;
    w.start_element("cac:PartyLegalEntity")?;
    w.text_element("cbc:RegistrationName", &buyer.name)?;
    w.end_element("cac:PartyLegalEntity")?;
    w.end_element("cac:Party")?;
    w.end_element("cac:AccountingCustomerParty")?;
    Ok(())
}

/// IVA percentage implied by a tax amount over a base. Falls back to
/// the standard rate when the base is zero.
fn implied_rate(tax: Decimal, base: Decimal, standard_rate: Decimal) -> Decimal {
    if base.is_zero() {
        standard_rate
    } else {
        (tax / base * Decimal::from(100))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

fn write_tax_category(w: &mut XmlWriter, rate: Decimal) -> Result<(), FacturaError> {
    w.start_element("cac:TaxCategory")?;
    w.text_element("cbc:Percent", &format_fixed2(rate))?;
    w.start_element("cac:TaxScheme")?;
    w.text_element("cbc:ID", IVA_SCHEME_ID)?;
    w.text_element("cbc:Name", IVA_SCHEME_NAME)?;
    w.end_element("cac:TaxScheme")?;
    w.end_element("cac:TaxCategory")?;
    Ok(())
}

fn write_tax_total(
    w: &mut XmlWriter,
    invoice: &Invoice,
    standard_rate: Decimal,
) -> Result<(), FacturaError> {
    let tax = invoice.tax_total();
    let base = invoice.tax_exclusive_amount;
    let currency = invoice.currency_code.as_str();

    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", tax, currency)?;
    w.start_element("cac:TaxSubtotal")?;
    w.amount_element("cbc:TaxableAmount", base, currency)?;
    w.amount_element("cbc:TaxAmount", tax, currency)?;
    write_tax_category(w, implied_rate(tax, base, standard_rate))?;
    w.end_element("cac:TaxSubtotal")?;
    w.end_element("cac:TaxTotal")?;
    Ok(())
}

fn write_monetary_total(w: &mut XmlWriter, invoice: &Invoice) -> Result<(), FacturaError> {
    let currency = invoice.currency_code.as_str();
    w.start_element("cac:LegalMonetaryTotal")?;
    w.amount_element("cbc:LineExtensionAmount", invoice.line_extension_amount, currency)?;
    w.amount_element("cbc:TaxExclusiveAmount", invoice.tax_exclusive_amount, currency)?;
    w.amount_element("cbc:TaxInclusiveAmount", invoice.tax_inclusive_amount, currency)?;
    w.amount_element("cbc:PayableAmount", invoice.payable_amount, currency)?;
    w.end_element("cac:LegalMonetaryTotal")?;
    Ok(())
}

fn write_line(
    w: &mut XmlWriter,
    invoice: &Invoice,
    number: usize,
    line: &crate::core::LineItem,
    standard_rate: Decimal,
) -> Result<(), FacturaError> {
    let currency = invoice.currency_code.as_str();

    w.start_element("cac:InvoiceLine")?;
    w.text_element("cbc:ID", &number.to_string())?;
    w.quantity_element("cbc:InvoicedQuantity", line.quantity, &line.unit_code)?;
    w.amount_element("cbc:LineExtensionAmount", line.line_extension_amount, currency)?;

    if line.discount_amount > Decimal::ZERO {
        w.start_element("cac:AllowanceCharge")?;
        w.text_element("cbc:ChargeIndicator", "false")?;
        w.text_element("cbc:AllowanceChargeReason", "Descuento")?;
        w.amount_element("cbc:Amount", line.discount_amount, currency)?;
        w.end_element("cac:AllowanceCharge")?;
    }

    if line.tax_amount > Decimal::ZERO {
        w.start_element("cac:TaxTotal")?;
        w.amount_element("cbc:TaxAmount", line.tax_amount, currency)?;
        w.start_element("cac:TaxSubtotal")?;
        w.amount_element("cbc:TaxableAmount", line.line_extension_amount, currency)?;
        w.amount_element("cbc:TaxAmount", line.tax_amount, currency)?;
        write_tax_category(
            w,
            implied_rate(line.tax_amount, line.line_extension_amount, standard_rate),
        )?;
        w.end_element("cac:TaxSubtotal")?;
        w.end_element("cac:TaxTotal")?;
    }

    w.start_element("cac:Item")?;
    w.text_element("cbc:Description", &line.description)?;
    w.end_element("cac:Item")?;
    w.start_element("cac:Price")?;
    w.amount_element("cbc:PriceAmount", line.unit_price, currency)?;
    w.end_element("cac:Price")?;
    w.end_element("cac:InvoiceLine")?;
    Ok(())
}
