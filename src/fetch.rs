//! The catalog source boundary.
//!
//! [`CatalogSource`] is the contract the orchestrator consumes: discovery
//! (terms, subjects, key lists) plus "fetch and parse one catalog entry,
//! returning a structured record or failing with a typed error". Page
//! field extraction itself is an external collaborator; the bundled
//! [`HttpCatalogSource`] talks to a deployment that re-exposes the catalog
//! as JSON endpoints and owns the HTTP-status → [`FetchError`]
//! classification.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{FetchError, Result};
use crate::pool::CancelToken;
use crate::types::{CatalogKey, CourseRecord, TermCode};

/// External collaborator producing structured records for catalog keys.
pub trait CatalogSource: Send + Sync {
    /// Discovers the available terms, newest first.
    fn list_terms(&self) -> std::result::Result<Vec<TermCode>, FetchError>;

    /// Discovers the subjects of one term.
    fn list_subjects(&self, term: &TermCode) -> std::result::Result<Vec<String>, FetchError>;

    /// Discovers the catalog keys of one subject.
    fn list_keys(
        &self,
        term: &TermCode,
        subject: &str,
    ) -> std::result::Result<Vec<CatalogKey>, FetchError>;

    /// Fetches and parses one catalog entry. `cancel` is a best-effort stop
    /// request: implementations should check it before issuing the request
    /// and may bound in-flight work with their own timeouts.
    fn fetch(
        &self,
        term: &TermCode,
        key: &CatalogKey,
        cancel: &CancelToken,
    ) -> std::result::Result<CourseRecord, FetchError>;
}

/// JSON-endpoint catalog source over a blocking HTTP client.
///
/// Endpoint layout, relative to the base URL:
///
/// ```text
/// GET /terms.json                         -> ["202609", ...]
/// GET /{term}/subjects.json               -> ["CSCI", ...]
/// GET /{term}/{subject}/keys.json         -> [{"subject":"CSCI","number":"1100"}, ...]
/// GET /{term}/courses/{subject}-{number}.json -> CourseRecord
/// ```
pub struct HttpCatalogSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpCatalogSource {
    /// Builds a client with the given per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crawldex/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { client, base_url })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, FetchError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(classify_request_error)?;
        classify_status(response.status())?;
        response
            .json()
            .map_err(|err| FetchError::Malformed(err.to_string()))
    }
}

impl CatalogSource for HttpCatalogSource {
    fn list_terms(&self) -> std::result::Result<Vec<TermCode>, FetchError> {
        let codes: Vec<String> = self.get_json("terms.json")?;
        Ok(codes.into_iter().map(TermCode::new).collect())
    }

    fn list_subjects(&self, term: &TermCode) -> std::result::Result<Vec<String>, FetchError> {
        self.get_json(&format!("{term}/subjects.json"))
    }

    fn list_keys(
        &self,
        term: &TermCode,
        subject: &str,
    ) -> std::result::Result<Vec<CatalogKey>, FetchError> {
        self.get_json(&format!("{term}/{subject}/keys.json"))
    }

    fn fetch(
        &self,
        term: &TermCode,
        key: &CatalogKey,
        cancel: &CancelToken,
    ) -> std::result::Result<CourseRecord, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        self.get_json(&format!(
            "{term}/courses/{}-{}.json",
            key.subject, key.number
        ))
    }
}

/// Maps transport-level failures onto the retry taxonomy: timeouts and
/// connection problems are transient, everything else is not.
fn classify_request_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        FetchError::Transient(err.to_string())
    } else {
        FetchError::Other(err.to_string())
    }
}

/// Maps HTTP status codes onto the retry taxonomy.
fn classify_status(status: reqwest::StatusCode) -> std::result::Result<(), FetchError> {
    use reqwest::StatusCode;
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::FORBIDDEN => FetchError::Forbidden,
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        status if status.is_server_error() => {
            FetchError::Transient(format!("server error: {status}"))
        }
        status => FetchError::Other(format!("unexpected status: {status}")),
    })
}
