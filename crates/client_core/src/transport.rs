use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    error::ApiError,
    protocol::{HealthResponse, QueryRequest, QueryResponse, ReadinessResponse},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{config::ClientSettings, error::ConfigError, error::TransportError};

/// The query side of the retrieval backend.
///
/// Implementations must stop work promptly once `cancel` fires and return
/// [`TransportError::Cancelled`]; the caller treats anything that settles after
/// cancellation as stale regardless of what is returned.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<QueryResponse, TransportError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    pub(crate) http: Client,
    server_url: String,
}

impl HttpBackend {
    /// `server_url` is used as-is; run it through
    /// [`normalize_base_url`](crate::config::normalize_base_url) first.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_client(server_url, Client::new())
    }

    /// Uses a caller-configured `reqwest` client (proxy, timeouts, headers).
    pub fn with_client(server_url: impl Into<String>, http: Client) -> Self {
        Self {
            http,
            server_url: server_url.into(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ConfigError> {
        let server_url = crate::config::normalize_base_url(&settings.api_base_url)?;
        Ok(Self::new(server_url))
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.server_url)
    }

    pub async fn health(&self) -> Result<HealthResponse, TransportError> {
        let endpoint = self.endpoint("healthz");
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| TransportError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;
        read_json(&endpoint, response).await
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse, TransportError> {
        let endpoint = self.endpoint("readyz");
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| TransportError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;
        read_json(&endpoint, response).await
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<QueryResponse, TransportError> {
        let endpoint = self.endpoint("query");
        let call = async {
            let response = self
                .http
                .post(&endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|source| TransportError::Http {
                    endpoint: endpoint.clone(),
                    source,
                })?;
            read_json::<QueryResponse>(&endpoint, response).await
        };

        // Dropping `call` aborts the in-flight request.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%endpoint, "backend: query aborted");
                Err(TransportError::Cancelled)
            }
            result = call => result,
        }
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<T, TransportError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|source| TransportError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;

    if !status.is_success() {
        let detail = ApiError::from_response(status.as_u16(), &String::from_utf8_lossy(&body));
        warn!(
            endpoint,
            status = status.as_u16(),
            code = ?detail.code,
            detail = %detail.message,
            "backend: request failed"
        );
        return Err(TransportError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            detail,
        });
    }

    serde_json::from_slice(&body).map_err(|source| {
        warn!(endpoint, %source, "backend: malformed response body");
        TransportError::Decode {
            endpoint: endpoint.to_string(),
            source,
        }
    })
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
