//! UBL 2.1 document assembly for Colombian electronic invoices:
//! structured XML generation, enveloped signature embedding, and
//! structural validation of the finished document.

mod assemble;
mod signature;
mod validate;
mod xml_utils;

pub use assemble::*;
pub use signature::*;
pub use validate::*;
pub use xml_utils::*;

/// UBL version carried in `cbc:UBLVersionID`.
pub const UBL_VERSION: &str = "UBL 2.1";

/// DIAN customization identifier for a sales invoice.
pub const CUSTOMIZATION_ID: &str = "DIAN 2.1: Factura Electrónica de Venta";

/// DIAN profile identifier.
pub const PROFILE_ID: &str = "DIAN 2.1";

/// Scheme identifier attached to the document `cbc:UUID` (the CUFE).
pub const CUFE_SCHEME_ID: &str = "CUFE-SHA384";

/// Scheme under which the supplier's NIT is registered.
pub const SUPPLIER_ID_SCHEME: &str = "4";

/// Colombian VAT tax scheme code and name.
pub const IVA_SCHEME_ID: &str = "01";
pub const IVA_SCHEME_NAME: &str = "IVA";

/// Root namespaces of the invoice document.
pub const NS_INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
pub const NS_CAC: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
pub const NS_CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
pub const NS_EXT: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
pub const NS_DS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML-DSig algorithm identifiers written into `ds:SignedInfo`.
pub const C14N_METHOD: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const SIGNATURE_METHOD: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const ENVELOPED_TRANSFORM: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
pub const DIGEST_METHOD: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
