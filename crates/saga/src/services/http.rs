//! Shared HTTP plumbing for the collaborator clients.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::DownstreamError;

/// Per-attempt deadline for catalog, sale and loyalty calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-attempt deadline for exchange-rate calls.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(1);

/// Base URL plus a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
    }

    /// Sends the request, mapping transport failures.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, DownstreamError> {
        request.send().await.map_err(|err| self.map_error(err))
    }

    /// Fails with `UnexpectedStatus` unless the status is 200 or 201.
    pub async fn ensure_success(&self, response: Response) -> Result<Response, DownstreamError> {
        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DownstreamError::UnexpectedStatus {
            status: status.as_u16(),
            body: body.trim_end().to_string(),
        })
    }

    /// Reads and deserializes a JSON body.
    pub async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, DownstreamError> {
        let bytes = response.bytes().await.map_err(|err| self.map_error(err))?;
        serde_json::from_slice(&bytes).map_err(|err| DownstreamError::DecodeFailure(err.to_string()))
    }

    fn map_error(&self, err: reqwest::Error) -> DownstreamError {
        if err.is_timeout() {
            DownstreamError::Timeout(self.timeout)
        } else if err.is_decode() {
            DownstreamError::DecodeFailure(err.to_string())
        } else {
            DownstreamError::ConnectionFailure(err.to_string())
        }
    }
}
