//! # facturacol
//!
//! Electronic invoicing for the Colombian DIAN clearance model:
//! CUFE fingerprint generation, UBL 2.1 document assembly and
//! signing, structural validation, resilient submission to the
//! authority, status reconciliation, and an immutable archive of
//! everything sent.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating
//! point, and render with exactly two decimals on the wire.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Domain types, pre-submission gate, CUFE fingerprints, numbering |
//! | `ubl` | UBL 2.1 assembly, signature embedding, structural validation |
//! | `dian` | Authority client, retries, QR links, submission store, pipeline |
//! | `all` | Everything |
//!
//! ## Quick Start
//!
//! ```rust
//! use facturacol::core::{CufeInputs, generate_cufe};
//! use rust_decimal_macros::dec;
//!
//! let cufe = generate_cufe(&CufeInputs {
//!     issuer_tax_id: "900123456-7",
//!     invoice_number: "FAC-1042",
//!     issue_date: "2025-01-15 10:30:00",
//!     payable_amount: dec!(119000),
//!     tax_amount: dec!(19000),
//!     type_code: "01",
//!     currency_code: "COP",
//! })?;
//! assert_eq!(cufe.len(), 96);
//! # Ok::<(), facturacol::core::FacturaError>(())
//! ```

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "ubl")]
pub mod ubl;

#[cfg(feature = "dian")]
pub mod dian;

#[cfg(feature = "core")]
pub use crate::core::{FacturaError, ValidationError};
