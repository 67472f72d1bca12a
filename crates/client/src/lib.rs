//! REST client for the source and target endpoints the proxy migrates
//! between.
//!
//! Wraps the generic collection API every migratable service exposes
//! (list, fetch by id, filtered query, create) using [`reqwest`]. The
//! caller's credential is forwarded verbatim on every request; the client
//! never holds credentials of its own.

pub mod url;

use std::time::Duration;

use ferry_core::record::Record;
use serde_json::Value;

/// Credential captured from the incoming request, forwarded verbatim.
///
/// Either an `Authorization` header value, an `access_token` cookie, or both.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    pub authorization: Option<String>,
    pub access_token: Option<String>,
}

impl Credential {
    pub fn is_empty(&self) -> bool {
        self.authorization.is_none() && self.access_token.is_none()
    }
}

/// Errors from the outbound REST layer.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Request to upstream failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream returned a non-2xx status code.
    #[error("Upstream returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The upstream returned 2xx but the body was not the expected JSON
    /// shape.
    #[error("Upstream returned an unexpected payload: {0}")]
    Payload(String),
}

/// HTTP client for the collection API of a single service instance.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
}

impl RestClient {
    /// Create a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// GET a collection endpoint, expecting a JSON array of records.
    pub async fn list(&self, url: &str, credential: &Credential) -> Result<Vec<Record>, UpstreamError> {
        let response = self.get(url, &[], credential).await?;
        Self::parse_records(response).await
    }

    /// GET `<base>/<resource>/<id>`, expecting a single record.
    /// A 404 maps to `Ok(None)`.
    pub async fn fetch(
        &self,
        base_url: &str,
        resource_type: &str,
        id: &str,
        credential: &Credential,
    ) -> Result<Option<Record>, UpstreamError> {
        let url = format!("{base_url}/{resource_type}/{id}");
        let response = self.http_get(&url, &[], credential).await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::ensure_success(response).await?;
        let value: Value = response.json().await?;
        match value {
            Value::Object(record) => Ok(Some(record)),
            other => Err(UpstreamError::Payload(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// GET `<base>/<resource>?<field>=<value>`, expecting a filtered JSON
    /// array.
    pub async fn find_by(
        &self,
        base_url: &str,
        resource_type: &str,
        field: &str,
        value: &Value,
        credential: &Credential,
    ) -> Result<Vec<Record>, UpstreamError> {
        let url = format!("{base_url}/{resource_type}");
        let query_value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let response = self
            .get(&url, &[(field, query_value.as_str())], credential)
            .await?;
        Self::parse_records(response).await
    }

    /// POST a record to a collection endpoint, returning the created record
    /// (which carries the newly assigned `id`).
    pub async fn create(
        &self,
        url: &str,
        record: &Record,
        credential: &Credential,
    ) -> Result<Record, UpstreamError> {
        let request = self.with_credential(self.http.post(url), credential);
        let response = request.json(record).send().await?;
        let response = Self::ensure_success(response).await?;
        let value: Value = response.json().await?;
        match value {
            Value::Object(created) => Ok(created),
            other => Err(UpstreamError::Payload(format!(
                "expected the created record, got {other}"
            ))),
        }
    }

    /// GET a URL and discard the body; used by the access-control gate.
    pub async fn probe(&self, url: &str, credential: &Credential) -> Result<(), UpstreamError> {
        let response = self.http_get(url, &[], credential).await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        credential: &Credential,
    ) -> Result<reqwest::Response, UpstreamError> {
        let response = self.http_get(url, query, credential).await?;
        Self::ensure_success(response).await
    }

    async fn http_get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        credential: &Credential,
    ) -> Result<reqwest::Response, UpstreamError> {
        let mut request = self.http.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let request = self.with_credential(request, credential);
        Ok(request.send().await?)
    }

    fn with_credential(
        &self,
        request: reqwest::RequestBuilder,
        credential: &Credential,
    ) -> reqwest::RequestBuilder {
        let mut request = request;
        if let Some(authorization) = &credential.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }
        if let Some(token) = &credential.access_token {
            request = request.header(reqwest::header::COOKIE, format!("access_token={token}"));
        }
        request
    }

    /// Ensure the response has a success status code, or surface the status
    /// and body as [`UpstreamError::Rejected`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_records(response: reqwest::Response) -> Result<Vec<Record>, UpstreamError> {
        let value: Value = response.json().await?;
        let Value::Array(items) = value else {
            return Err(UpstreamError::Payload(
                "expected a JSON array of records".to_string(),
            ));
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                other => Err(UpstreamError::Payload(format!(
                    "expected an object, got {other}"
                ))),
            })
            .collect()
    }
}
