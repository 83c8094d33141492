//! HTTP boundary shared by every upstream call.
//!
//! `HttpClient` is the seam between the fetchers and reqwest so tests can
//! substitute canned responses. `FetchError` classifies every failure the
//! way the producer loop treats it.

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

const USER_AGENT: &str = concat!("flight-tracker/", env!("CARGO_PKG_VERSION"));

/// Failure classes for one upstream request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    /// 429. Inconclusive, never cached.
    #[error("rate limited")]
    RateLimited,
    /// Authoritative "nothing known for this key".
    #[error("not found")]
    NotFound,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Worth retrying on a later cycle (everything except an authoritative miss).
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::NotFound)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
        }
    }

    /// Body of a 2xx response; other statuses mapped to their error class.
    pub fn success_body(&self) -> Result<&[u8], FetchError> {
        match self.status {
            s if s.is_success() => Ok(&self.body),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
            s => Err(FetchError::Status(s.as_u16())),
        }
    }

    /// Decode a 2xx JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        let body = self.success_body()?;
        serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

/// Minimal GET-only client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// Real client backed by reqwest, with a per-request timeout and optional
/// basic auth.
pub struct ReqwestClient {
    client: reqwest::Client,
    credentials: Option<(String, String)>,
}

impl ReqwestClient {
    pub fn new(
        timeout: Duration,
        credentials: Option<(String, String)>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Other(format!("failed to create HTTP client: {e}")))?;
        Ok(ReqwestClient {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let mut request = self.client.get(url);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

// ---------------------------------------------------------------------------
// Mock client
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    /// Canned responses keyed by URL substring; first match wins.
    #[derive(Default)]
    pub struct MockHttpClient {
        routes: Vec<(String, Result<HttpResponse, FetchError>)>,
        calls: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            MockHttpClient::default()
        }

        pub fn respond(mut self, url_part: &str, status: u16, body: &str) -> Self {
            let status = StatusCode::from_u16(status).expect("valid status");
            self.routes
                .push((url_part.to_string(), Ok(HttpResponse::new(status, body))));
            self
        }

        pub fn fail(mut self, url_part: &str, error: FetchError) -> Self {
            self.routes.push((url_part.to_string(), Err(error)));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.routes
                .iter()
                .find(|(part, _)| url.contains(part.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| Err(FetchError::Connect(format!("no mock route for {url}"))))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
