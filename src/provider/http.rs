//! REST management-plane adapter.
//!
//! Resources live under `{endpoint}/resources/{kind}/{name}`. `PUT` creates
//! or updates, `DELETE` removes, `GET` reads a single resource or lists a kind
//! (optionally filtered by `?parent=`). Long-running operations are polled
//! until the provider reports a terminal status.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigParser, OptionMap, ProviderConfig, ResourceKind};
use crate::error::{ConfigError, ProviderError, Result};

use super::adapter::ProviderAdapter;
use super::types::{OperationResult, ProvisioningStatus, ResourceSnapshot};

/// Base delay between retries.
const RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on a server-requested rate-limit wait.
const MAX_RATE_LIMIT_WAIT_SECS: u64 = 60;

/// Body of a create-or-update request.
#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<&'a str>,
    config: &'a OptionMap,
}

/// HTTP adapter for a REST management API.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    endpoint: String,
    token: String,
    max_retries: u32,
    retry_delay: Duration,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl HttpProvider {
    /// Creates an adapter for the given endpoint and token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            max_retries: 3,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            poll_interval: Duration::from_millis(500),
            operation_timeout: Duration::from_secs(300),
        })
    }

    /// Creates an adapter from scenario provider settings.
    ///
    /// The token is read from the environment variable named by `token_env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or token is missing.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::validation("http provider requires an endpoint", "provider.endpoint"))?;
        let token = ConfigParser::get_api_token(&config.token_env)?;

        let provider = Self::new(endpoint, token, Duration::from_secs(config.timeout_secs))?
            .with_max_retries(config.max_retries)
            .with_polling(
                Duration::from_millis(config.poll_interval_ms),
                Duration::from_secs(config.operation_timeout_secs),
            );

        Ok(provider)
    }

    /// Sets the number of retries for transient failures.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the completion poll interval and overall operation timeout.
    #[must_use]
    pub const fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.operation_timeout = timeout;
        self
    }

    fn resource_url(&self, kind: ResourceKind, name: &str) -> String {
        format!("{}/resources/{kind}/{name}", self.endpoint)
    }

    fn kind_url(&self, kind: ResourceKind) -> String {
        format!("{}/resources/{kind}", self.endpoint)
    }

    /// Sends a request, retrying transient failures.
    async fn execute<F>(&self, build: F, kind: &str, name: &str) -> std::result::Result<Response, ProviderError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;

        loop {
            match self.execute_once(build(), kind, name).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = match &e {
                        ProviderError::RateLimited { retry_after_secs } => {
                            Duration::from_secs((*retry_after_secs).min(MAX_RATE_LIMIT_WAIT_SECS))
                        }
                        _ => self.retry_delay * attempt,
                    };
                    warn!("Retry attempt {attempt} of {} after: {e}", self.max_retries);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a single request and maps error statuses.
    async fn execute_once(
        &self,
        request: RequestBuilder,
        kind: &str,
        name: &str,
    ) -> std::result::Result<Response, ProviderError> {
        let response = request
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        trace!("{kind} '{name}': HTTP {status}");

        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1);
                Err(ProviderError::RateLimited {
                    retry_after_secs: retry_after,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::AuthenticationFailed {
                    message: String::from("Invalid API token"),
                })
            }
            StatusCode::NOT_FOUND => Err(ProviderError::not_found(kind, name)),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::Rejected {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    message: body,
                })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::api_error(status.as_u16(), body))
            }
        }
    }

    async fn parse_snapshot(response: Response) -> std::result::Result<ResourceSnapshot, ProviderError> {
        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                message: format!("Failed to parse resource: {e}"),
            })
    }

    /// Reads a single resource.
    async fn get(&self, kind: ResourceKind, name: &str) -> OperationResult {
        let url = self.resource_url(kind, name);
        let response = self
            .execute(|| self.client.get(&url), kind.as_str(), name)
            .await?;
        Self::parse_snapshot(response).await
    }

    /// Polls until the resource reaches a terminal status.
    async fn wait_for_completion(&self, mut snapshot: ResourceSnapshot) -> OperationResult {
        let deadline = Instant::now() + self.operation_timeout;

        while !snapshot.is_terminal() {
            if Instant::now() >= deadline {
                return Err(ProviderError::Timeout {
                    kind: snapshot.kind.to_string(),
                    name: snapshot.name,
                });
            }

            debug!(
                "{} '{}' is {}, polling again",
                snapshot.kind, snapshot.name, snapshot.status
            );
            tokio::time::sleep(self.poll_interval).await;
            snapshot = self.get(snapshot.kind, &snapshot.name).await?;
        }

        if snapshot.status == ProvisioningStatus::Failed {
            return Err(ProviderError::Rejected {
                kind: snapshot.kind.to_string(),
                name: snapshot.name,
                message: String::from("provisioning failed"),
            });
        }

        Ok(snapshot)
    }

    /// Polls until the resource is gone.
    async fn wait_for_removal(&self, kind: ResourceKind, name: &str) -> std::result::Result<(), ProviderError> {
        let deadline = Instant::now() + self.operation_timeout;

        loop {
            match self.get(kind, name).await {
                Err(ProviderError::NotFound { .. }) => return Ok(()),
                Err(e) => return Err(e),
                Ok(_) if Instant::now() >= deadline => {
                    return Err(ProviderError::Timeout {
                        kind: kind.to_string(),
                        name: name.to_string(),
                    });
                }
                Ok(_) => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for HttpProvider {
    async fn connect(&self) -> std::result::Result<(), ProviderError> {
        let url = format!("{}/health", self.endpoint);
        self.execute(|| self.client.get(&url), "endpoint", &self.endpoint)
            .await?;
        info!("Connected to {}", self.endpoint);
        Ok(())
    }

    async fn create_or_update<'p>(
        &self,
        kind: ResourceKind,
        name: &str,
        parent: Option<&'p str>,
        config: &OptionMap,
    ) -> OperationResult {
        let url = self.resource_url(kind, name);
        let body = PutRequest { parent, config };

        let response = self
            .execute(|| self.client.put(&url).json(&body), kind.as_str(), name)
            .await?;

        // The resource may exist from here on, whatever happens next.
        let confirmed = match Self::parse_snapshot(response).await {
            Ok(snapshot) => self.wait_for_completion(snapshot).await,
            Err(e) => Err(e),
        };
        confirmed.map_err(|e| {
            warn!("{kind} '{name}' was accepted but not confirmed: {e}");
            ProviderError::unconfirmed(kind, name, e)
        })
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> std::result::Result<(), ProviderError> {
        let url = self.resource_url(kind, name);
        let response = self
            .execute(|| self.client.delete(&url), kind.as_str(), name)
            .await?;

        if response.status() == StatusCode::ACCEPTED {
            debug!("Delete of {kind} '{name}' accepted, waiting for removal");
            self.wait_for_removal(kind, name).await?;
        }

        Ok(())
    }

    async fn list<'p>(
        &self,
        kind: ResourceKind,
        parent: Option<&'p str>,
    ) -> std::result::Result<Vec<ResourceSnapshot>, ProviderError> {
        let url = self.kind_url(kind);
        let response = self
            .execute(
                || {
                    let request = self.client.get(&url);
                    match parent {
                        Some(p) => request.query(&[("parent", p)]),
                        None => request,
                    }
                },
                kind.as_str(),
                parent.unwrap_or_default(),
            )
            .await?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                message: format!("Failed to parse resource list: {e}"),
            })
    }

    fn backend_type(&self) -> &'static str {
        "http"
    }
}
