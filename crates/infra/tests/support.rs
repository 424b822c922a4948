//! Shared fixtures for the OIDC integration tests: a fake identity provider
//! served by wiremock, a scriptable broker and a browser stand-in that
//! completes the loopback redirect.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flowery_common::security::SecureStorage;
use flowery_common::testing::MockSecureStorage;
use flowery_domain::OidcProviderConfig;
use flowery_infra::{
    BrokerError, BrokerResponse, BrokerStatus, BrowserLauncher, OAuthUserProvider,
    TransportCapability, WebAuthBroker,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROVIDER_KEY: &str = "corp";
pub const NAMESPACE: &str = "Flowery.OAuth.corp";
pub const BROKER_CALLBACK: &str = "flowery://auth-callback";

/// Unsigned compact JWT carrying `claims`.
pub fn id_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// Fake identity provider with discovery and token endpoints.
pub struct FakeProvider {
    pub server: MockServer,
}

impl FakeProvider {
    /// Provider whose ID token carries `id_token_claims` plus the nonce of
    /// the authorization request being redeemed.
    pub async fn start(id_token_claims: Value) -> Self {
        Self::start_with(id_token_claims, true).await
    }

    /// Provider whose ID token never carries a nonce.
    pub async fn start_without_nonce(id_token_claims: Value) -> Self {
        Self::start_with(id_token_claims, false).await
    }

    async fn start_with(id_token_claims: Value, echo_nonce: bool) -> Self {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": base,
                "authorization_endpoint": format!("{base}/authorize"),
                "token_endpoint": format!("{base}/token"),
                "userinfo_endpoint": format!("{base}/userinfo"),
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(move |request: &wiremock::Request| {
                let mut claims = id_token_claims.clone();
                if echo_nonce {
                    // The fake authorization code is the request's nonce.
                    let code = url::form_urlencoded::parse(&request.body)
                        .find(|(key, _)| key == "code")
                        .map(|(_, value)| value.into_owned());
                    if let (Some(object), Some(code)) = (claims.as_object_mut(), code) {
                        object.insert("nonce".into(), Value::String(code));
                    }
                }
                ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": "access-1",
                    "refresh_token": "refresh-1",
                    "id_token": id_token(&claims),
                    "token_type": "Bearer",
                    "expires_in": 3600
                }))
            })
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn config(&self) -> OidcProviderConfig {
        let mut config = OidcProviderConfig::new(PROVIDER_KEY, self.server.uri(), "desktop");
        config.loopback_port = 0;
        config.browser_timeout_seconds = Some(5);
        config
    }

    /// Mount a user-info endpoint answering `body` after `delay`.
    pub async fn mount_userinfo(&self, body: Value, delay: Duration, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body).set_delay(delay))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    pub async fn requests_to(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }
}

/// Redirect URL answering the authorization request in `start_url`.
///
/// The authorization code is the request's nonce so the fake token endpoint
/// can echo it into the ID token.
pub fn callback_for(start_url: &str, redirect_uri: &str) -> String {
    let state = query_param(start_url, "state").expect("state parameter");
    let nonce = query_param(start_url, "nonce").expect("nonce parameter");

    let mut callback = Url::parse(redirect_uri).expect("redirect uri");
    callback.query_pairs_mut().append_pair("code", &nonce).append_pair("state", &state);
    callback.into()
}

/// Query parameter `name` of `url`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Browser stand-in: follows the authorization request straight to the
/// loopback redirect.
#[derive(Default)]
pub struct RedirectingBrowser {
    pub launches: AtomicUsize,
    pub last_start_url: parking_lot::Mutex<Option<String>>,
}

impl BrowserLauncher for RedirectingBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_start_url.lock() = Some(url.to_string());

        let redirect_uri = query_param(url, "redirect_uri").ok_or("missing redirect_uri")?;
        let callback = callback_for(url, &redirect_uri);
        tokio::spawn(async move {
            let client = reqwest::Client::builder().no_proxy().build().expect("client");
            let _ = client.get(callback).send().await;
        });
        Ok(())
    }
}

impl RedirectingBrowser {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BrokerBehavior {
    Complete,
    UserCancel,
    NotSupported,
    CallbackNotImplemented,
}

/// Scriptable platform broker.
pub struct FakeBroker {
    pub behavior: BrokerBehavior,
    pub calls: AtomicUsize,
    pub start_urls: parking_lot::Mutex<Vec<String>>,
}

impl FakeBroker {
    pub fn new(behavior: BrokerBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            start_urls: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebAuthBroker for FakeBroker {
    fn callback_uri(&self) -> Result<String, BrokerError> {
        match self.behavior {
            BrokerBehavior::CallbackNotImplemented => {
                Err(BrokerError::NotImplemented("callback uri".into()))
            }
            _ => Ok(BROKER_CALLBACK.to_string()),
        }
    }

    async fn authenticate(
        &self,
        start_url: &str,
        callback_uri: &str,
        _cancel: &CancellationToken,
    ) -> Result<BrokerResponse, BrokerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.start_urls.lock().push(start_url.to_string());
        match self.behavior {
            BrokerBehavior::Complete => Ok(BrokerResponse::success(callback_for(start_url, callback_uri))),
            BrokerBehavior::UserCancel => Ok(BrokerResponse::with_status(BrokerStatus::UserCancel)),
            BrokerBehavior::NotSupported | BrokerBehavior::CallbackNotImplemented => {
                Err(BrokerError::NotSupported("no broker on this platform".into()))
            }
        }
    }
}

/// Provider wired to `fake`, `storage`, `transport` and `browser`.
pub fn build_provider(
    fake: &FakeProvider,
    storage: &MockSecureStorage,
    transport: TransportCapability,
    browser: Arc<RedirectingBrowser>,
) -> OAuthUserProvider {
    OAuthUserProvider::builder(fake.config())
        .storage(Arc::new(storage.clone()) as Arc<dyn SecureStorage>)
        .transport(transport)
        .launcher(browser)
        .build()
        .expect("provider")
}
