//! reqwest-backed provider transport

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::error::ProviderFailure;
use crate::traits::HttpTransport;
use crate::types::{ProviderRequest, TransportResponse};

/// Real HTTP transport sharing one connection pool across providers
#[derive(Clone, Default)]
pub struct RealHttpTransport {
    client: reqwest::Client,
}

impl RealHttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, ProviderFailure> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProviderFailure::Transport(format!("invalid header name '{name}': {e}")))?;
            // Never echo header values: they carry secrets
            let value = HeaderValue::from_str(value)
                .map_err(|_| ProviderFailure::Transport(format!("invalid value for header '{name}'")))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl HttpTransport for RealHttpTransport {
    async fn post_json(&self, request: &ProviderRequest) -> Result<TransportResponse, ProviderFailure> {
        let headers = Self::header_map(&request.headers)?;

        let response = self
            .client
            .post(&request.endpoint)
            .headers(headers)
            .timeout(request.timeout)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderFailure::Timeout(request.timeout)
                } else {
                    ProviderFailure::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderFailure::Timeout(request.timeout)
            } else {
                ProviderFailure::Transport(format!("failed to read body: {}", e.without_url()))
            }
        })?;

        debug!(provider = %request.provider_id, status, "Provider responded with HTTP {}", status);
        Ok(TransportResponse { status, body })
    }
}
