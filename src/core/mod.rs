//! Core domain types, error taxonomy, pre-submission gate, CUFE
//! fingerprint generation, and numbering ranges.

mod error;
mod fingerprint;
mod gate;
mod numbering;
mod types;

pub use error::*;
pub use fingerprint::*;
pub use gate::*;
pub use numbering::*;
pub use types::*;
