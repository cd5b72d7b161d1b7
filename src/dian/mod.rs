//! Authority integration: environment and credential configuration,
//! the HTTP client with retry handling, status reconciliation, QR
//! verification links, the submission store, and the end-to-end
//! submission pipeline.

mod client;
mod pipeline;
mod qr;
mod retry;
mod store;

pub use client::*;
pub use pipeline::*;
pub use qr::*;
pub use retry::*;
pub use store::*;

use serde::{Deserialize, Serialize};

/// Target authority environment. Habilitación is the certification
/// sandbox, Producción the live endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Habilitacion,
    Produccion,
}

impl Environment {
    /// API base for document submission and status queries.
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Habilitacion => "https://api-hab.dian.gov.co",
            Environment::Produccion => "https://api.dian.gov.co",
        }
    }

    /// Public catalog base used for QR verification links.
    pub fn verification_base_url(self) -> &'static str {
        match self {
            Environment::Habilitacion => "https://catalogo-vpfe-hab.dian.gov.co",
            Environment::Produccion => "https://catalogo-vpfe.dian.gov.co",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "HABILITACION" => Some(Environment::Habilitacion),
            "PRODUCCION" => Some(Environment::Produccion),
            _ => None,
        }
    }
}

/// Connection settings for the authority API.
#[derive(Debug, Clone)]
pub struct DianConfig {
    pub environment: Environment,
    /// PEM bundle (certificate plus key) presented for mutual TLS.
    pub client_identity_pem: Option<Vec<u8>>,
    /// Optional HTTP basic credentials layered on top of mTLS.
    pub basic_auth: Option<(String, String)>,
}

impl DianConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            client_identity_pem: None,
            basic_auth: None,
        }
    }

    /// Reads `DIAN_ENVIRONMENT`, `DIAN_IDENTITY_PEM_PATH`,
    /// `DIAN_BASIC_USER` and `DIAN_BASIC_PASSWORD`. Unset variables
    /// fall back to the habilitación sandbox with no credentials.
    pub fn from_env() -> std::io::Result<Self> {
        let environment = std::env::var("DIAN_ENVIRONMENT")
            .ok()
            .and_then(|v| Environment::from_name(&v))
            .unwrap_or(Environment::Habilitacion);
        let client_identity_pem = match std::env::var("DIAN_IDENTITY_PEM_PATH") {
            Ok(path) => Some(std::fs::read(path)?),
            Err(_) => None,
        };
        let basic_auth = match (
            std::env::var("DIAN_BASIC_USER"),
            std::env::var("DIAN_BASIC_PASSWORD"),
        ) {
            (Ok(user), Ok(password)) => Some((user, password)),
            _ => None,
        };
        Ok(Self {
            environment,
            client_identity_pem,
            basic_auth,
        })
    }
}
