use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::{FacturaError, format_fixed2};

fn xml_io(e: std::io::Error) -> FacturaError {
    FacturaError::Assembly(format!("XML write error: {e}"))
}

/// Thin structured writer over quick-xml. All text content goes
/// through the event API, so escaping is enforced; free text can
/// never break the document shape.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, FacturaError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(quick_xml::events::BytesDecl::new(
                "1.0",
                Some("UTF-8"),
                None,
            )))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, FacturaError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| FacturaError::Assembly(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, FacturaError> {
        let elem = BytesStart::new(name);
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, FacturaError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, FacturaError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, FacturaError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, FacturaError> {
        self.start_element_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Monetary amount with currencyID attribute, always 2 decimals.
    pub fn amount_element(
        &mut self,
        name: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<&mut Self, FacturaError> {
        self.text_element_with_attrs(name, &format_fixed2(amount), &[("currencyID", currency)])
    }

    /// Quantity with unitCode attribute.
    pub fn quantity_element(
        &mut self,
        name: &str,
        qty: Decimal,
        unit: &str,
    ) -> Result<&mut Self, FacturaError> {
        self.text_element_with_attrs(name, &format_fixed2(qty), &[("unitCode", unit)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn writer_escapes_free_text() {
        let mut w = XmlWriter::new().unwrap();
        w.start_element("Invoice").unwrap();
        w.text_element("cbc:Note", "Cables <2mm> & \"conectores\"")
            .unwrap();
        w.end_element("Invoice").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("Cables &lt;2mm&gt; &amp; &quot;conectores&quot;"));
        assert!(!xml.contains("<2mm>"));
    }

    #[test]
    fn amount_element_renders_two_decimals() {
        let mut w = XmlWriter::new().unwrap();
        w.start_element("t").unwrap();
        w.amount_element("cbc:PayableAmount", dec!(119000), "COP")
            .unwrap();
        w.end_element("t").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains(r#"<cbc:PayableAmount currencyID="COP">119000.00</cbc:PayableAmount>"#));
    }
}
