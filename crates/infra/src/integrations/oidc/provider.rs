//! Generic OAuth2 / OpenID Connect identity provider.
//!
//! [`OAuthUserProvider`] exposes a single signed-in user through the
//! [`flowery_core`] ports. It owns the session, the profile resolver and the
//! login coordinator of one provider connection.

use std::sync::Arc;

use async_trait::async_trait;
use flowery_common::auth::{LoginOutcome, OidcClient, OidcClientOptions};
use flowery_common::security::SecureStorage;
use flowery_core::{
    CancellationToken, InteractiveAuthProvider, ProviderMetadata, SessionEvent, TokenSaveProvider,
    TokenStateProvider, UserDirectory,
};
use flowery_domain::constants::PROVIDER_IMPLEMENTATION_VERSION;
use flowery_domain::{HttpSettings, OidcProviderConfig, Result, UserProfile};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::broker::TransportCapability;
use super::coordinator::OidcAuthCoordinator;
use super::discovery::DiscoveryResolver;
use super::loopback::BrowserLauncher;
use super::profile::{profile_from_claims, ProfileResolver};
use super::session::SessionStore;
use super::transport::TransportState;
use crate::http::HttpClient;

pub struct OAuthUserProvider {
    metadata: ProviderMetadata,
    session: SessionStore,
    resolver: ProfileResolver,
    coordinator: Arc<OidcAuthCoordinator>,
    warm_up: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl OAuthUserProvider {
    pub fn builder(config: OidcProviderConfig) -> OAuthUserProviderBuilder {
        OAuthUserProviderBuilder::new(config)
    }

    pub fn provider_key(&self) -> &str {
        &self.metadata.provider_key
    }

    pub fn transport_state(&self) -> TransportState {
        self.coordinator.transport_state()
    }

    /// Warm up the broker authorization request. Never fails.
    pub async fn prepare(&self, cancel: &CancellationToken) {
        self.coordinator.prepare(cancel).await;
    }

    /// Background broker warm-up started by the builder, if any.
    pub fn take_warm_up(&self) -> Option<JoinHandle<()>> {
        self.warm_up.lock().take()
    }

    /// Run [`Self::prepare`] in the background.
    pub fn spawn_prepare(self: &Arc<Self>) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            provider.prepare(&CancellationToken::new()).await;
        })
    }

    /// Run a login and return the raw outcome without touching the session.
    pub async fn login(&self, cancel: &CancellationToken) -> LoginOutcome {
        self.coordinator.login(cancel).await
    }
}

#[async_trait]
impl UserDirectory for OAuthUserProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn get_current_user(&self, cancel: &CancellationToken) -> Option<UserProfile> {
        self.resolver.resolve(&self.session, cancel).await
    }

    async fn get_user_by_id(&self, id: &str, cancel: &CancellationToken) -> Option<UserProfile> {
        if id.trim().is_empty() || !self.session.has_token() {
            return None;
        }
        self.get_current_user(cancel).await.filter(|user| user.matches_id(id))
    }

    async fn search_users(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Vec<UserProfile> {
        let mut users: Vec<UserProfile> = self
            .get_all_users(cancel)
            .await
            .into_iter()
            .filter(|user| user.matches_query(query))
            .collect();
        if max_results > 0 {
            users.truncate(max_results);
        }
        users
    }

    async fn get_all_users(&self, cancel: &CancellationToken) -> Vec<UserProfile> {
        self.get_current_user(cancel).await.into_iter().collect()
    }

    async fn refresh(&self) {
        self.session.publish_users_changed();
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }
}

impl TokenStateProvider for OAuthUserProvider {
    fn has_token(&self) -> bool {
        self.session.has_token()
    }
}

impl TokenSaveProvider for OAuthUserProvider {
    fn save_token(&self, token: &str) {
        self.session.save_token(token);
    }
}

#[async_trait]
impl InteractiveAuthProvider for OAuthUserProvider {
    async fn authenticate(&self, cancel: &CancellationToken) -> bool {
        let login = match self.coordinator.login(cancel).await {
            LoginOutcome::Success(login) => login,
            LoginOutcome::Failure(failure) => {
                warn!(provider = %self.metadata.provider_key, error = %failure, "interactive login failed");
                return false;
            }
        };

        let profile = profile_from_claims(&self.metadata.provider_key, &login.claims);
        self.session.establish(&login.tokens, profile);
        self.session.publish_users_changed();
        info!(provider = %self.metadata.provider_key, "interactive login succeeded");
        true
    }
}

/// Builder for [`OAuthUserProvider`].
pub struct OAuthUserProviderBuilder {
    config: OidcProviderConfig,
    storage: Option<Arc<dyn SecureStorage>>,
    transport: TransportCapability,
    launcher: Option<Arc<dyn BrowserLauncher>>,
    http: Option<HttpClient>,
    http_settings: HttpSettings,
}

impl OAuthUserProviderBuilder {
    pub fn new(config: OidcProviderConfig) -> Self {
        Self {
            config,
            storage: None,
            transport: TransportCapability::default(),
            launcher: None,
            http: None,
            http_settings: HttpSettings::default(),
        }
    }

    pub fn storage(mut self, storage: Arc<dyn SecureStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn transport(mut self, transport: TransportCapability) -> Self {
        self.transport = transport;
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    pub fn http_settings(mut self, settings: HttpSettings) -> Self {
        self.http_settings = settings;
        self
    }

    /// Build the provider and restore any persisted session.
    ///
    /// # Errors
    /// Returns `FloweryError::Config` when the provider key, authority or
    /// client id is blank, or the HTTP client cannot be built.
    pub fn build(self) -> Result<OAuthUserProvider> {
        let config = self.config;
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => HttpClient::from_settings(&self.http_settings)?,
        };

        let options = OidcClientOptions::new(&config.authority, &config.client_id, &config.scope)
            .with_client_secret(config.client_secret.clone())
            .with_post_logout_redirect_uri(
                config.post_logout_redirect_uri.clone().or_else(|| config.redirect_uri.clone()),
            );
        let broker_capable = matches!(self.transport, TransportCapability::Broker(_));
        let mut coordinator =
            OidcAuthCoordinator::new(OidcClient::new(options, http.inner().clone()), self.transport)
                .with_redirect_uri(config.redirect_uri.clone())
                .with_loopback_port(config.loopback_port)
                .with_browser_timeout(config.browser_timeout());
        if let Some(launcher) = self.launcher {
            coordinator = coordinator.with_launcher(launcher);
        }

        let discovery = DiscoveryResolver::new(&config.authority, http.clone());
        let resolver = ProfileResolver::new(&config.provider_key, discovery, http);

        let session = SessionStore::new(&config.provider_key, self.storage);
        if config.load_token_from_storage {
            session.restore();
        }

        let metadata = ProviderMetadata {
            provider_key: config.provider_key.clone(),
            display_name: config.effective_display_name().to_string(),
            implementation_version: PROVIDER_IMPLEMENTATION_VERSION.to_string(),
            supports_avatars: config.supports_avatars,
            supports_presence: config.supports_presence,
            supports_realtime: config.supports_realtime,
        };

        let coordinator = Arc::new(coordinator);
        let warm_up = if broker_capable {
            spawn_warm_up(&coordinator)
        } else {
            None
        };

        info!(
            provider = %metadata.provider_key,
            transport = ?coordinator.transport_state(),
            has_token = session.has_token(),
            warming_up = warm_up.is_some(),
            "identity provider ready"
        );

        Ok(OAuthUserProvider {
            metadata,
            session,
            resolver,
            coordinator,
            warm_up: parking_lot::Mutex::new(warm_up),
        })
    }
}

/// Prepare the broker request on the caller's runtime; skipped without one.
fn spawn_warm_up(coordinator: &Arc<OidcAuthCoordinator>) -> Option<JoinHandle<()>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!("no async runtime at construction; broker warm-up left to the host");
        return None;
    };
    let coordinator = Arc::clone(coordinator);
    Some(runtime.spawn(async move {
        coordinator.prepare(&CancellationToken::new()).await;
    }))
}
