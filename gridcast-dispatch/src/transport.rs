//! Transport abstraction for per-host dispatch attempts
//!
//! The sweep only cares about "execute this request against that URL and
//! tell me the outcome", so that is the whole trait. The shipped
//! implementation rides on reqwest; tests substitute a stub.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request descriptor swept across candidate hosts
///
/// `path` is joined onto the selected registration's host and service path;
/// the dispatcher fills in the host as it walks the ranked list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub method: RequestMethod,
    pub path: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl ServiceRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Get,
            path: path.into(),
            body: None,
            content_type: None,
        }
    }

    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Post,
            path: path.into(),
            body: Some(body.into()),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Outcome of a single host attempt
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failure of a single host attempt (network error, timeout, malformed
/// response). The sweep records it and moves on to the next host.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request` against `url`. Implementations must bound each
    /// attempt with a timeout so one hung host cannot stall a sweep.
    async fn execute(
        &self,
        url: &str,
        request: &ServiceRequest,
    ) -> Result<TransportResponse, TransportError>;
}

/// HTTP transport backed by reqwest, every attempt bounded by the same
/// timeout
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        url: &str,
        request: &ServiceRequest,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = match request.method {
            RequestMethod::Get => self.client.get(url),
            RequestMethod::Post => self.client.post(url),
            RequestMethod::Put => self.client.put(url),
            RequestMethod::Delete => self.client.delete(url),
        };

        if let Some(content_type) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("failed to read response body: {e}")))?;

        Ok(TransportResponse { status, body })
    }
}
