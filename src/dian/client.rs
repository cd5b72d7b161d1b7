use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::core::{AttemptVerdict, AuthorityAcceptance, AuthorityStatus, DocumentStatus, FacturaError};
use crate::ubl::is_well_formed;

use super::retry::{RetryBudget, RetryPolicy, STATUS_RETRY, SUBMIT_RETRY};
use super::{DianConfig, Environment};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw HTTP answer, before any protocol interpretation.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

impl WireResponse {
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Wire-level abstraction under the client, so retry behavior can be
/// exercised without a network.
pub trait Transport {
    fn post_xml(&self, url: &str, body: &str, timeout: Duration) -> Result<WireResponse, String>;
    fn get(&self, url: &str, timeout: Duration) -> Result<WireResponse, String>;
}

/// Production transport: reqwest over rustls, presenting the client
/// identity for mutual TLS plus optional basic credentials.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    basic_auth: Option<(String, String)>,
}

impl HttpTransport {
    pub fn new(config: &DianConfig) -> Result<Self, FacturaError> {
        let mut builder = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .connect_timeout(CONNECT_TIMEOUT);
        if let Some(pem) = &config.client_identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| FacturaError::Transport(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }
        let client = builder
            .build()
            .map_err(|e| FacturaError::Transport(format!("HTTP client construction failed: {e}")))?;
        Ok(Self {
            client,
            basic_auth: config.basic_auth.clone(),
        })
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.basic_auth {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    fn dispatch(&self, request: reqwest::blocking::RequestBuilder) -> Result<WireResponse, String> {
        let response = self.authorize(request).send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| e.to_string())?;
        Ok(WireResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn post_xml(&self, url: &str, body: &str, timeout: Duration) -> Result<WireResponse, String> {
        self.dispatch(
            self.client
                .post(url)
                .timeout(timeout)
                .header(reqwest::header::CONTENT_TYPE, "application/xml")
                .header(reqwest::header::ACCEPT, "application/json")
                .body(body.to_owned()),
        )
    }

    fn get(&self, url: &str, timeout: Duration) -> Result<WireResponse, String> {
        self.dispatch(self.client.get(url).timeout(timeout))
    }
}

/// Response body of the submission and status endpoints. The service
/// is inconsistent about field names across versions, hence aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DianApiResponse {
    #[serde(alias = "isValid")]
    pub is_valid: bool,
    #[serde(alias = "uuid")]
    pub cufe: Option<String>,
    #[serde(alias = "zipKey")]
    pub number: Option<String>,
    #[serde(alias = "issueDate")]
    pub issue_date: Option<String>,
    #[serde(alias = "statusCode")]
    pub status_code: Option<String>,
    #[serde(alias = "statusMessage")]
    pub status_message: Option<String>,
    #[serde(alias = "statusDescription")]
    pub status_description: Option<String>,
    pub errors: Vec<String>,
    #[serde(alias = "errorMessages")]
    pub error_messages: Vec<String>,
    #[serde(alias = "qrCode")]
    pub qr_code: Option<String>,
}

impl DianApiResponse {
    fn rejection_reasons(&self) -> Vec<String> {
        let mut reasons: Vec<String> = self
            .errors
            .iter()
            .chain(self.error_messages.iter())
            .cloned()
            .collect();
        if reasons.is_empty() {
            if let Some(message) = &self.status_message {
                reasons.push(message.clone());
            }
        }
        reasons
    }

    fn into_acceptance(self) -> AuthorityAcceptance {
        AuthorityAcceptance {
            cufe: self.cufe,
            protocol_number: self.number,
            validation_date: self.issue_date,
            response_code: self.status_code.unwrap_or_else(|| "00".into()),
            response_message: self
                .status_message
                .unwrap_or_else(|| "Procesado Correctamente".into()),
            confirmation: self.status_description.or(self.qr_code),
        }
    }
}

/// Uniform interface over the real authority and the simulator, so
/// the pipeline never knows which one it is talking to.
pub trait AuthorityClient {
    /// Submits a signed document. `Ok` carries the authority's
    /// definitive answer (accepted or rejected); `Err` means no
    /// definitive answer was obtained.
    fn submit_document(
        &self,
        xml: &str,
        budget: &RetryBudget,
    ) -> Result<AttemptVerdict, FacturaError>;

    fn document_status(
        &self,
        cufe: &str,
        budget: &RetryBudget,
    ) -> Result<DocumentStatus, FacturaError>;
}

/// Client for the DIAN web service.
pub struct DianClient<T: Transport> {
    environment: Environment,
    transport: T,
    submit_policy: RetryPolicy,
    status_policy: RetryPolicy,
}

impl DianClient<HttpTransport> {
    pub fn connect(config: &DianConfig) -> Result<Self, FacturaError> {
        Ok(Self::with_transport(
            config.environment,
            HttpTransport::new(config)?,
        ))
    }
}

impl<T: Transport> DianClient<T> {
    pub fn with_transport(environment: Environment, transport: T) -> Self {
        Self {
            environment,
            transport,
            submit_policy: SUBMIT_RETRY,
            status_policy: STATUS_RETRY,
        }
    }

    pub fn with_policies(mut self, submit: RetryPolicy, status: RetryPolicy) -> Self {
        self.submit_policy = submit;
        self.status_policy = status;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.environment.base_url())
    }

    /// Retry loop shared by all endpoints. Transient outcomes
    /// (transport failure, 5xx, undecodable body) are retried within
    /// the policy and budget; anything else is final.
    fn run<R>(
        &self,
        operation: &str,
        policy: RetryPolicy,
        budget: &RetryBudget,
        attempt_fn: impl Fn() -> Result<WireResponse, String>,
        classify: impl Fn(WireResponse) -> Classified<R>,
    ) -> Result<R, FacturaError> {
        let mut last_failure = String::from("no attempt was made");
        for attempt in 1..=policy.attempts {
            if !budget.allows_attempt() {
                return Err(FacturaError::Transport(format!(
                    "{operation} abandoned before attempt {attempt}: budget exhausted ({last_failure})"
                )));
            }
            match attempt_fn() {
                Ok(response) => match classify(response) {
                    Classified::Final(result) => return result,
                    Classified::Transient(reason) => {
                        warn!(operation, attempt, reason = %reason, "transient failure");
                        last_failure = reason;
                    }
                },
                Err(reason) => {
                    warn!(operation, attempt, reason = %reason, "transport failure");
                    last_failure = reason;
                }
            }
            if attempt < policy.attempts && !budget.sleep(policy.delay(attempt)) {
                return Err(FacturaError::Transport(format!(
                    "{operation} abandoned during backoff: {last_failure}"
                )));
            }
        }
        Err(FacturaError::Transport(format!(
            "{operation} failed after {} attempt(s): {last_failure}",
            policy.attempts
        )))
    }

    /// POST the signed document to `/ubl2.1/send-bill`.
    pub fn submit(&self, xml: &str, budget: &RetryBudget) -> Result<AttemptVerdict, FacturaError> {
        let url = self.url("/ubl2.1/send-bill");
        self.run(
            "send-bill",
            self.submit_policy,
            budget,
            || self.transport.post_xml(&url, xml, SUBMIT_TIMEOUT),
            |response| {
                if response.is_server_error() {
                    return Classified::Transient(format!(
                        "authority returned HTTP {}",
                        response.status
                    ));
                }
                if response.is_client_error() {
                    return Classified::Final(Ok(AttemptVerdict::Rejected {
                        code: response.status.to_string(),
                        reasons: vec![format!("authority refused the request: {}", response.body)],
                    }));
                }
                match serde_json::from_str::<DianApiResponse>(&response.body) {
                    Ok(api) if api.is_valid => {
                        info!(cufe = api.cufe.as_deref(), "document accepted");
                        Classified::Final(Ok(AttemptVerdict::Accepted(api.into_acceptance())))
                    }
                    Ok(api) => Classified::Final(Ok(AttemptVerdict::Rejected {
                        code: api.status_code.clone().unwrap_or_else(|| "99".into()),
                        reasons: api.rejection_reasons(),
                    })),
                    Err(e) => Classified::Transient(format!("undecodable response body: {e}")),
                }
            },
        )
    }

    /// GET `/ubl2.1/get-status/{cufe}`.
    pub fn status(&self, cufe: &str, budget: &RetryBudget) -> Result<DocumentStatus, FacturaError> {
        let url = self.url(&format!("/ubl2.1/get-status/{cufe}"));
        let cufe_owned = cufe.to_owned();
        self.run(
            "get-status",
            self.status_policy,
            budget,
            || self.transport.get(&url, STATUS_TIMEOUT),
            move |response| {
                if response.is_server_error() {
                    return Classified::Transient(format!(
                        "authority returned HTTP {}",
                        response.status
                    ));
                }
                match serde_json::from_str::<DianApiResponse>(&response.body) {
                    Ok(api) => {
                        let status = if api.is_valid {
                            AuthorityStatus::Accepted
                        } else {
                            AuthorityStatus::Rejected
                        };
                        Classified::Final(Ok(DocumentStatus {
                            cufe: api.cufe.unwrap_or_else(|| cufe_owned.clone()),
                            status,
                            is_valid: api.is_valid,
                        }))
                    }
                    Err(e) => Classified::Transient(format!("undecodable response body: {e}")),
                }
            },
        )
    }

    /// GET `/ubl2.1/get-cdr/{cufe}`: the application response
    /// document confirming processing. Verified to be parseable XML.
    pub fn download_receipt(
        &self,
        cufe: &str,
        budget: &RetryBudget,
    ) -> Result<String, FacturaError> {
        let url = self.url(&format!("/ubl2.1/get-cdr/{cufe}"));
        self.run(
            "get-cdr",
            self.status_policy,
            budget,
            || self.transport.get(&url, STATUS_TIMEOUT),
            |response| {
                if response.is_server_error() {
                    return Classified::Transient(format!(
                        "authority returned HTTP {}",
                        response.status
                    ));
                }
                if !is_well_formed(&response.body) {
                    return Classified::Transient("receipt is not well-formed XML".into());
                }
                Classified::Final(Ok(response.body))
            },
        )
    }
}

enum Classified<R> {
    Final(Result<R, FacturaError>),
    Transient(String),
}

impl<T: Transport> AuthorityClient for DianClient<T> {
    fn submit_document(
        &self,
        xml: &str,
        budget: &RetryBudget,
    ) -> Result<AttemptVerdict, FacturaError> {
        self.submit(xml, budget)
    }

    fn document_status(
        &self,
        cufe: &str,
        budget: &RetryBudget,
    ) -> Result<DocumentStatus, FacturaError> {
        self.status(cufe, budget)
    }
}

/// Offline stand-in for the authority, used in the certification lab
/// and in tests. Accepts any well-formed document carrying a UUID and
/// answers with a protocol number derived from the document content,
/// so repeated submissions of the same bytes get the same answer.
pub struct SimulatedAuthority {
    accepted: Mutex<HashSet<String>>,
}

impl Default for SimulatedAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAuthority {
    pub fn new() -> Self {
        Self {
            accepted: Mutex::new(HashSet::new()),
        }
    }

    fn protocol_number(xml: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(xml.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().take(6).map(|b| format!("{b:02X}")).collect();
        format!("PRT-{hex}")
    }

    fn extract_uuid(xml: &str) -> Option<String> {
        let mut reader = quick_xml::Reader::from_str(xml);
        let mut in_uuid = false;
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Start(e)) => {
                    let name = e.name();
                    let local = name.as_ref().rsplit(|b| *b == b':').next().unwrap_or(b"");
                    in_uuid = local == &b"UUID"[..];
                }
                Ok(quick_xml::events::Event::Text(t)) if in_uuid => {
                    return t.unescape().ok().map(|s| s.into_owned());
                }
                Ok(quick_xml::events::Event::End(_)) => in_uuid = false,
                Ok(quick_xml::events::Event::Eof) => return None,
                Err(_) => return None,
                _ => {}
            }
        }
    }
}

impl AuthorityClient for SimulatedAuthority {
    fn submit_document(
        &self,
        xml: &str,
        _budget: &RetryBudget,
    ) -> Result<AttemptVerdict, FacturaError> {
        if !is_well_formed(xml) {
            return Ok(AttemptVerdict::Rejected {
                code: "400".into(),
                reasons: vec!["document is not well-formed XML".into()],
            });
        }
        let Some(cufe) = Self::extract_uuid(xml) else {
            return Ok(AttemptVerdict::Rejected {
                code: "90".into(),
                reasons: vec!["document carries no UUID".into()],
            });
        };
        self.accepted
            .lock()
            .expect("simulator lock poisoned")
            .insert(cufe.clone());
        Ok(AttemptVerdict::Accepted(AuthorityAcceptance {
            cufe: Some(cufe),
            protocol_number: Some(Self::protocol_number(xml)),
            validation_date: None,
            response_code: "00".into(),
            response_message: "Procesado Correctamente".into(),
            confirmation: None,
        }))
    }

    fn document_status(
        &self,
        cufe: &str,
        _budget: &RetryBudget,
    ) -> Result<DocumentStatus, FacturaError> {
        let known = self
            .accepted
            .lock()
            .expect("simulator lock poisoned")
            .contains(cufe);
        Ok(DocumentStatus {
            cufe: cufe.to_owned(),
            status: if known {
                AuthorityStatus::Accepted
            } else {
                AuthorityStatus::Pending
            },
            is_valid: known,
        })
    }
}
