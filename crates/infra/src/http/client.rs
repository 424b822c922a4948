use std::time::Duration;

use flowery_domain::constants::{DEFAULT_HTTP_MAX_ATTEMPTS, DEFAULT_HTTP_TIMEOUT_SECS};
use flowery_domain::{FloweryError, HttpSettings};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::errors::InfraError;

/// Retry schedule for identity-provider GETs.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    attempts: usize,
    base_backoff: Duration,
}

impl RetryPolicy {
    /// Exponential delay before retry `n` (1-based), capped at 2^8 times the base.
    fn delay_before(&self, retry: usize) -> Duration {
        let shift = retry.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    fn has_more(&self, attempt: usize) -> bool {
        attempt < self.attempts
    }
}

/// What one attempt produced.
enum Attempt {
    Done(Response),
    Retry,
    Failed(reqwest::Error),
}

/// JSON-over-HTTP client used for discovery and user-info requests.
///
/// Wraps a shared `reqwest::Client`. Transport failures and 5xx responses
/// are retried up to the configured attempt count; any other status is
/// handed back to the caller.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Client with default timeout and a single attempt.
    pub fn new() -> Result<Self, FloweryError> {
        Self::builder().build()
    }

    /// Build a client from the `[http]` section of the configuration.
    pub fn from_settings(settings: &HttpSettings) -> Result<Self, FloweryError> {
        let mut builder = Self::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds.max(1)))
            .max_attempts(settings.max_attempts);
        if let Some(agent) = settings.user_agent.as_deref().filter(|a| !a.trim().is_empty()) {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }

    /// The underlying reqwest client. The OIDC client drives its own token
    /// exchange through it.
    pub fn inner(&self) -> &ReqwestClient {
        &self.client
    }

    /// GET `url` with `Authorization: Bearer <token>` and decode a JSON body.
    pub async fn get_json_with_bearer(&self, url: &str, token: &str) -> Result<Value, FloweryError> {
        self.fetch_json(self.client.get(url).bearer_auth(token)).await
    }

    /// Unauthenticated GET returning a JSON body.
    pub async fn get_json(&self, url: &str) -> Result<Value, FloweryError> {
        self.fetch_json(self.client.get(url)).await
    }

    async fn fetch_json(&self, request: RequestBuilder) -> Result<Value, FloweryError> {
        let response = self.execute(request).await?;
        let response = response.error_for_status().map_err(to_flowery)?;
        response
            .json::<Value>()
            .await
            .map_err(|err| FloweryError::InvalidInput(format!("response body is not valid JSON: {err}")))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, FloweryError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = request
                .try_clone()
                .ok_or_else(|| FloweryError::Internal("streaming request cannot be retried".into()))?
                .build()
                .map_err(to_flowery)?;
            let url = request.url().clone();

            let outcome = match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt, %url, %status, "identity provider responded");
                    if status.is_server_error() && self.retry.has_more(attempt) {
                        Attempt::Retry
                    } else {
                        Attempt::Done(response)
                    }
                }
                Err(err) => {
                    debug!(attempt, %url, error = %err, "identity provider request failed");
                    if is_transient(&err) && self.retry.has_more(attempt) {
                        Attempt::Retry
                    } else {
                        Attempt::Failed(err)
                    }
                }
            };

            match outcome {
                Attempt::Done(response) => return Ok(response),
                Attempt::Failed(err) => return Err(to_flowery(err)),
                Attempt::Retry => {
                    let delay = self.retry.delay_before(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_attempts: DEFAULT_HTTP_MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts per request, including the first one.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, FloweryError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(to_flowery)?;

        Ok(HttpClient {
            client,
            retry: RetryPolicy { attempts: self.max_attempts.max(1), base_backoff: self.base_backoff },
        })
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn to_flowery(err: reqwest::Error) -> FloweryError {
    InfraError::from(err).into()
}
