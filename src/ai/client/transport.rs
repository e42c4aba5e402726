//! HTTP exchange with the backend
//!
//! One call is one POST. Status interpretation, retries and failover live in
//! the client, so implementations only move bytes.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::ai::timeout::TimeoutConfig;
use crate::types::{BuildwrightError, ClientError, Result};

/// Raw HTTP result of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Pluggable exchange. Returns `Err` only when no HTTP response arrived.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(
        &self,
        api_key: &SecretString,
        body: &Value,
    ) -> std::result::Result<RawResponse, ClientError>;

    /// Endpoint description for logs
    fn endpoint(&self) -> &str;
}

/// reqwest-backed transport. The key travels in the `x-goog-api-key` header,
/// never in the URL.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl HttpTransport {
    /// `{api_base}/models/{model}:generateContent`
    pub fn new(api_base: &str, model: &str, timeouts: TimeoutConfig) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/models/{}:generateContent",
            api_base.trim_end_matches('/'),
            model
        ))
        .map_err(|e| BuildwrightError::Config(format!("Invalid backend URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeouts.backend_request)
            .connect_timeout(timeouts.connection)
            .build()
            .map_err(|e| BuildwrightError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(
        &self,
        api_key: &SecretString,
        body: &Value,
    ) -> std::result::Result<RawResponse, ClientError> {
        debug!(endpoint = %self.endpoint, "Sending backend request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let code = if e.is_timeout() {
                    "TIMEOUT"
                } else {
                    "NETWORK_ERROR"
                };
                ClientError::network(code, format!("Request failed: {}", e))
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::network("NETWORK_ERROR", format!("Failed to read body: {}", e)))?;

        Ok(RawResponse { status, body })
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_construction() {
        let transport = HttpTransport::new(
            "https://generativelanguage.googleapis.com/v1beta/",
            "gemini-2.5-pro",
            TimeoutConfig::default(),
        )
        .unwrap();
        assert_eq!(
            transport.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
        );
        assert!(!transport.endpoint().contains("key="));
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(HttpTransport::new("not a url", "m", TimeoutConfig::default()).is_err());
    }

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(!RawResponse::new(429, "").is_success());
    }
}
