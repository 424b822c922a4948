//! Interactive login orchestration across the broker and loopback transports.

use std::sync::Arc;
use std::time::Duration;

use flowery_common::auth::{AuthorizeState, LoginOutcome, OidcClient};
use flowery_core::CancellationToken;
use flowery_domain::constants::{DEFAULT_BROWSER_TIMEOUT_SECS, DEFAULT_LOOPBACK_PORT};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::broker::{BrokerError, BrokerStatus, TransportCapability, WebAuthBroker};
use super::loopback::{
    is_loopback_uri, random_unused_port, redirect_uri_for_port, BrowserLauncher,
    LoopbackCallbackServer, LoopbackOutcome, SystemBrowser,
};
use super::transport::{TransportSelector, TransportState};

/// Drives one interactive login at a time to completion.
///
/// The broker is used until it reports itself unsupported; from then on every
/// attempt goes through the loopback listener.
pub struct OidcAuthCoordinator {
    client: OidcClient,
    selector: TransportSelector,
    redirect_uri: Option<String>,
    loopback_port: u16,
    browser_timeout: Duration,
    launcher: Arc<dyn BrowserLauncher>,
    pending: Mutex<Option<AuthorizeState>>,
}

impl OidcAuthCoordinator {
    pub fn new(client: OidcClient, capability: TransportCapability) -> Self {
        Self {
            client,
            selector: TransportSelector::new(capability),
            redirect_uri: None,
            loopback_port: DEFAULT_LOOPBACK_PORT,
            browser_timeout: Duration::from_secs(DEFAULT_BROWSER_TIMEOUT_SECS),
            launcher: Arc::new(SystemBrowser),
            pending: Mutex::new(None),
        }
    }

    /// Registered redirect URI; blank values are ignored.
    pub fn with_redirect_uri(mut self, redirect_uri: Option<String>) -> Self {
        self.redirect_uri = redirect_uri.filter(|uri| !uri.trim().is_empty());
        self
    }

    /// Loopback listener port; `0` picks a free port per attempt.
    pub fn with_loopback_port(mut self, port: u16) -> Self {
        self.loopback_port = port;
        self
    }

    pub fn with_browser_timeout(mut self, timeout: Duration) -> Self {
        self.browser_timeout = timeout;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn transport_state(&self) -> TransportState {
        self.selector.state()
    }

    pub fn client(&self) -> &OidcClient {
        &self.client
    }

    /// Pre-build the broker authorization request.
    ///
    /// Never fails. An unsupported broker latches the loopback transport;
    /// other failures leave the next login to build its own request.
    pub async fn prepare(&self, cancel: &CancellationToken) {
        let Some(broker) = self.selector.broker() else {
            return;
        };
        if cancel.is_cancelled() {
            return;
        }

        let redirect_uri = match self.broker_redirect_uri(broker.as_ref()) {
            Ok(uri) => uri,
            Err(err) => {
                self.handle_prepare_broker_error(err).await;
                return;
            }
        };

        match self.client.prepare_login(&redirect_uri, &[]).await {
            Ok(state) => {
                debug!("broker authorization request prepared");
                *self.pending.lock().await = Some(state);
            }
            Err(err) => debug!(error = %err, "failed to prepare broker login"),
        }
    }

    async fn handle_prepare_broker_error(&self, err: BrokerError) {
        if err.is_unsupported() {
            self.selector.latch_loopback();
            self.pending.lock().await.take();
        } else {
            debug!(error = %err, "broker callback URI unavailable during prepare");
        }
    }

    /// Run one interactive login. Failures come back as
    /// [`LoginOutcome::Failure`].
    pub async fn login(&self, cancel: &CancellationToken) -> LoginOutcome {
        if cancel.is_cancelled() {
            return LoginOutcome::failure("cancelled", None);
        }

        if let Some(broker) = self.selector.broker() {
            match self.login_with_broker(broker.as_ref(), cancel).await {
                Ok(outcome) => return outcome,
                Err(err) => {
                    warn!(error = %err, "broker failed at runtime; retrying login via loopback");
                    self.selector.latch_loopback();
                    self.pending.lock().await.take();
                }
            }
        }

        self.login_with_loopback(cancel).await
    }

    /// `Err` only for unsupported-broker errors; everything else is an outcome.
    async fn login_with_broker(
        &self,
        broker: &dyn WebAuthBroker,
        cancel: &CancellationToken,
    ) -> Result<LoginOutcome, BrokerError> {
        let redirect_uri = match self.broker_redirect_uri(broker) {
            Ok(uri) => uri,
            Err(err) => return broker_failure(err),
        };

        let request = match self.take_pending(&redirect_uri).await {
            Some(request) => request,
            None => match self.client.prepare_login(&redirect_uri, &[]).await {
                Ok(request) => request,
                Err(err) => {
                    warn!(error = %err, "failed to build authorization request");
                    return Ok(LoginOutcome::failure(err.error_code(), Some(err.to_string())));
                }
            },
        };

        info!(transport = "broker", "starting interactive login");
        let response = match broker.authenticate(&request.start_url, &redirect_uri, cancel).await {
            Ok(response) => response,
            Err(err) => return broker_failure(err),
        };

        if response.status != BrokerStatus::Success {
            info!(status = %response.status, "broker login did not complete");
            return Ok(LoginOutcome::failure(response.status.to_string(), None));
        }

        match response.data.filter(|data| !data.trim().is_empty()) {
            Some(data) => Ok(self.client.process_response(&data, &request).await),
            None => Ok(LoginOutcome::failure(
                "invalid_response",
                Some("broker returned no response data".into()),
            )),
        }
    }

    async fn login_with_loopback(&self, cancel: &CancellationToken) -> LoginOutcome {
        let redirect_uri = match self.loopback_redirect_uri() {
            Ok(uri) => uri,
            Err(err) => {
                warn!(error = %err, "no free loopback port");
                return LoginOutcome::failure("bind_failed", Some(err.to_string()));
            }
        };

        let request = match self.client.prepare_login(&redirect_uri, &[("prompt", "login")]).await {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "failed to build authorization request");
                return LoginOutcome::failure(err.error_code(), Some(err.to_string()));
            }
        };

        info!(transport = "loopback", %redirect_uri, "starting interactive login");
        let server = LoopbackCallbackServer::new(redirect_uri)
            .with_timeout(Some(self.browser_timeout))
            .with_launcher(Arc::clone(&self.launcher));

        let outcome = tokio::select! {
            outcome = server.run(&request.start_url) => outcome,
            _ = cancel.cancelled() => return LoginOutcome::failure("cancelled", None),
        };

        match outcome {
            LoopbackOutcome::Success { response_url } => {
                self.client.process_response(&response_url, &request).await
            }
            LoopbackOutcome::Timeout => {
                warn!("timed out waiting for the browser redirect");
                LoginOutcome::failure("timeout", None)
            }
            LoopbackOutcome::BindFailed(ref msg) | LoopbackOutcome::UnknownError(ref msg) => {
                warn!(error = %msg, "loopback login failed");
                LoginOutcome::failure(outcome.error_code(), Some(msg.clone()))
            }
        }
    }

    fn broker_redirect_uri(&self, broker: &dyn WebAuthBroker) -> Result<String, BrokerError> {
        match &self.redirect_uri {
            Some(uri) => Ok(uri.clone()),
            None => broker.callback_uri(),
        }
    }

    fn loopback_redirect_uri(&self) -> std::io::Result<String> {
        if let Some(uri) = self.redirect_uri.as_deref().filter(|uri| is_loopback_uri(uri)) {
            return Ok(uri.to_string());
        }
        let port = match self.loopback_port {
            0 => random_unused_port()?,
            port => port,
        };
        Ok(redirect_uri_for_port(port))
    }

    async fn take_pending(&self, redirect_uri: &str) -> Option<AuthorizeState> {
        self.pending.lock().await.take().filter(|state| state.redirect_uri == redirect_uri)
    }
}

fn broker_failure(err: BrokerError) -> Result<LoginOutcome, BrokerError> {
    if err.is_unsupported() {
        return Err(err);
    }
    warn!(error = %err, "broker login failed");
    Ok(LoginOutcome::failure("broker_error", Some(err.to_string())))
}

#[cfg(test)]
mod tests {
    use flowery_common::auth::OidcClientOptions;

    use super::*;

    fn coordinator() -> OidcAuthCoordinator {
        let options = OidcClientOptions::new("http://127.0.0.1:1", "app", "openid");
        OidcAuthCoordinator::new(
            OidcClient::new(options, reqwest::Client::new()),
            TransportCapability::LoopbackOnly,
        )
    }

    #[test]
    fn loopback_redirect_prefers_configured_loopback_uri() {
        let coordinator = coordinator()
            .with_redirect_uri(Some("http://localhost:5555/callback".into()));
        assert_eq!(coordinator.loopback_redirect_uri().unwrap(), "http://localhost:5555/callback");
    }

    #[test]
    fn loopback_redirect_ignores_custom_scheme_redirects() {
        let coordinator = coordinator()
            .with_redirect_uri(Some("app://callback".into()))
            .with_loopback_port(7890);
        assert_eq!(coordinator.loopback_redirect_uri().unwrap(), "http://127.0.0.1:7890/");
    }

    #[test]
    fn port_zero_picks_an_ephemeral_port() {
        let coordinator = coordinator().with_loopback_port(0);
        let uri = coordinator.loopback_redirect_uri().unwrap();
        assert!(uri.starts_with("http://127.0.0.1:"));
        assert!(!uri.starts_with("http://127.0.0.1:0/"));
    }

    #[tokio::test]
    async fn cancelled_login_fails_without_network() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = coordinator().login(&cancel).await;
        assert_eq!(outcome.error().unwrap().error, "cancelled");
    }

    #[tokio::test]
    async fn unreachable_provider_yields_failed_outcome() {
        let outcome = coordinator().with_loopback_port(0).login(&CancellationToken::new()).await;
        assert!(!outcome.is_success());
    }
}
