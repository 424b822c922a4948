//! OpenID Connect client with PKCE support
//!
//! Handles the provider-facing half of an interactive login:
//! - Discovery document retrieval (cached per client)
//! - Authorization request construction
//! - Callback response validation (error, state, nonce)
//! - Authorization code exchange

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use super::claims::Claims;
use super::pkce::{validate_state, PkceChallenge};
use super::types::{
    AuthorizeState, DiscoveryDocument, LoginOutcome, LoginTokens, OAuthError, OidcClientOptions,
    TokenResponse, TokenSet,
};

/// Error type for OIDC client operations
#[derive(Debug)]
pub enum OidcClientError {
    /// HTTP request failed
    RequestFailed(reqwest::Error),

    /// Provider answered with a non-success status and no OAuth error body
    HttpStatus(u16),

    /// OAuth server returned an error
    OAuthError(OAuthError),

    /// Discovery document missing or incomplete
    Discovery(String),

    /// State parameter mismatch (CSRF attack detected)
    StateMismatch,

    /// ID token nonce does not match the request
    NonceMismatch,

    /// ID token could not be decoded
    InvalidIdToken(String),

    /// Failed to parse response
    ParseError(String),

    /// Invalid configuration
    ConfigError(String),
}

impl OidcClientError {
    /// Short error code suitable for a failed [`LoginOutcome`].
    #[must_use]
    pub fn error_code(&self) -> String {
        match self {
            Self::OAuthError(e) => e.error.clone(),
            Self::RequestFailed(_) => "request_failed".into(),
            Self::HttpStatus(status) => format!("http_{status}"),
            Self::Discovery(_) => "discovery_failed".into(),
            Self::StateMismatch => "invalid_state".into(),
            Self::NonceMismatch => "invalid_nonce".into(),
            Self::InvalidIdToken(_) => "invalid_id_token".into(),
            Self::ParseError(_) => "invalid_response".into(),
            Self::ConfigError(_) => "invalid_configuration".into(),
        }
    }
}

impl std::fmt::Display for OidcClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::HttpStatus(status) => write!(f, "Provider returned HTTP {status}"),
            Self::OAuthError(e) => write!(f, "OAuth error: {e}"),
            Self::Discovery(msg) => write!(f, "Discovery error: {msg}"),
            Self::StateMismatch => write!(f, "State mismatch (CSRF)"),
            Self::NonceMismatch => write!(f, "ID token nonce mismatch"),
            Self::InvalidIdToken(msg) => write!(f, "Invalid ID token: {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OidcClientError {}

impl From<reqwest::Error> for OidcClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// OpenID Connect client for the authorization code flow
///
/// The HTTP client is injected so hosts control proxy, TLS and timeout
/// settings. The discovery document is fetched on first use and kept for
/// the lifetime of this client; failed fetches are not cached.
#[derive(Debug)]
pub struct OidcClient {
    options: OidcClientOptions,
    http: Client,
    discovery: Mutex<Option<Arc<DiscoveryDocument>>>,
}

impl OidcClient {
    /// Create a new client.
    ///
    /// # Examples
    /// ```
    /// use flowery_common::auth::{OidcClient, OidcClientOptions};
    ///
    /// let options = OidcClientOptions::new("https://id.example.com", "app", "openid profile");
    /// let client = OidcClient::new(options, reqwest::Client::new());
    /// assert_eq!(client.options().client_id, "app");
    /// ```
    #[must_use]
    pub fn new(options: OidcClientOptions, http: Client) -> Self {
        Self { options, http, discovery: Mutex::new(None) }
    }

    #[must_use]
    pub const fn options(&self) -> &OidcClientOptions {
        &self.options
    }

    /// Fetch (or return the cached) discovery document.
    ///
    /// # Errors
    /// Returns an error on network failure, non-success status or an
    /// unparseable body. Nothing is cached in that case.
    pub async fn discovery(&self) -> Result<Arc<DiscoveryDocument>, OidcClientError> {
        let mut cached = self.discovery.lock().await;
        if let Some(doc) = cached.as_ref() {
            return Ok(Arc::clone(doc));
        }

        let url = self.options.discovery_url();
        debug!(%url, "fetching discovery document");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(OidcClientError::HttpStatus(response.status().as_u16()));
        }

        let doc: DiscoveryDocument =
            response.json().await.map_err(|e| OidcClientError::ParseError(e.to_string()))?;
        let doc = Arc::new(doc);
        *cached = Some(Arc::clone(&doc));
        Ok(doc)
    }

    /// Build an authorization request for `redirect_uri`.
    ///
    /// `extra_params` are appended verbatim (e.g. `prompt=login`).
    ///
    /// # Errors
    /// Returns an error when discovery fails or the provider does not
    /// advertise a usable authorization endpoint.
    pub async fn prepare_login(
        &self,
        redirect_uri: &str,
        extra_params: &[(&str, &str)],
    ) -> Result<AuthorizeState, OidcClientError> {
        let doc = self.discovery().await?;
        let endpoint = doc
            .authorization_endpoint
            .as_deref()
            .ok_or_else(|| OidcClientError::Discovery("missing authorization_endpoint".into()))?;

        let mut url = Url::parse(endpoint)
            .map_err(|e| OidcClientError::Discovery(format!("authorization_endpoint: {e}")))?;

        let challenge = PkceChallenge::generate();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.options.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", &self.options.scope)
                .append_pair("state", &challenge.state)
                .append_pair("nonce", &challenge.nonce)
                .append_pair("code_challenge", &challenge.code_challenge)
                .append_pair("code_challenge_method", challenge.challenge_method());
            for (key, value) in extra_params {
                query.append_pair(key, value);
            }
        }

        debug!(client_id = %self.options.client_id, %redirect_uri, "prepared authorization request");

        Ok(AuthorizeState {
            start_url: url.into(),
            redirect_uri: redirect_uri.to_string(),
            state: challenge.state,
            nonce: challenge.nonce,
            code_verifier: challenge.code_verifier,
        })
    }

    /// Sign-out URL at the provider's `end_session_endpoint`.
    ///
    /// Carries `client_id`, the configured `post_logout_redirect_uri` and,
    /// when given, the `id_token_hint`. `None` when the provider advertises
    /// no end-session endpoint.
    ///
    /// # Errors
    /// Returns an error when discovery fails or the advertised endpoint is
    /// not a valid URL.
    pub async fn end_session_url(
        &self,
        id_token_hint: Option<&str>,
    ) -> Result<Option<String>, OidcClientError> {
        let doc = self.discovery().await?;
        let Some(endpoint) = doc.end_session_endpoint.as_deref() else {
            return Ok(None);
        };

        let mut url = Url::parse(endpoint)
            .map_err(|e| OidcClientError::Discovery(format!("end_session_endpoint: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.options.client_id);
            if let Some(uri) = self.options.post_logout_redirect_uri.as_deref() {
                query.append_pair("post_logout_redirect_uri", uri);
            }
            if let Some(hint) = id_token_hint.filter(|h| !h.is_empty()) {
                query.append_pair("id_token_hint", hint);
            }
        }
        Ok(Some(url.into()))
    }

    /// Validate a callback URL and redeem its authorization code.
    ///
    /// Never fails: every problem is reported as [`LoginOutcome::Failure`].
    pub async fn process_response(
        &self,
        response_url: &str,
        request: &AuthorizeState,
    ) -> LoginOutcome {
        match self.try_process_response(response_url, request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "authorization response rejected");
                LoginOutcome::failure(err.error_code(), Some(err.to_string()))
            }
        }
    }

    async fn try_process_response(
        &self,
        response_url: &str,
        request: &AuthorizeState,
    ) -> Result<LoginOutcome, OidcClientError> {
        let params = callback_params(response_url)?;

        if let Some(error) = params.get("error").filter(|e| !e.is_empty()) {
            return Ok(LoginOutcome::failure(
                error.clone(),
                params.get("error_description").cloned(),
            ));
        }

        let code = params
            .get("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OidcClientError::ParseError("callback has no code".into()))?;

        let received_state = params.get("state").map_or("", String::as_str);
        if !validate_state(&request.state, received_state) {
            return Err(OidcClientError::StateMismatch);
        }

        let tokens = self.exchange_code(code, request).await?;

        let claims = match tokens.id_token.as_deref() {
            Some(id_token) => {
                let claims = Claims::from_id_token(id_token)?;
                // An ID token must echo the nonce sent with this request.
                let nonce = claims.get("nonce").unwrap_or_default();
                if !validate_state(&request.nonce, &nonce) {
                    return Err(OidcClientError::NonceMismatch);
                }
                claims
            }
            None => Claims::new(),
        };

        Ok(LoginOutcome::Success(LoginTokens { tokens, claims }))
    }

    /// Exchange an authorization code at the token endpoint.
    ///
    /// # Errors
    /// Returns an error if discovery fails, the provider rejects the code,
    /// or the response carries no access token.
    pub async fn exchange_code(
        &self,
        code: &str,
        request: &AuthorizeState,
    ) -> Result<TokenSet, OidcClientError> {
        let doc = self.discovery().await?;
        let token_url = doc
            .token_endpoint
            .as_deref()
            .ok_or_else(|| OidcClientError::Discovery("missing token_endpoint".into()))?;

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("client_id", self.options.client_id.as_str()),
            ("code_verifier", request.code_verifier.as_str()),
        ];
        if let Some(secret) = self.options.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        debug!(%token_url, "exchanging authorization code");
        let response = self.http.post(token_url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<OAuthError>(&body) {
                Ok(error) => OidcClientError::OAuthError(error),
                Err(_) => OidcClientError::HttpStatus(status.as_u16()),
            });
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| OidcClientError::ParseError(e.to_string()))?;

        token_response
            .into_token_set()
            .ok_or_else(|| OidcClientError::ParseError("token response has no access_token".into()))
    }
}

/// Query (or, failing that, fragment) parameters of a callback URL.
fn callback_params(response_url: &str) -> Result<HashMap<String, String>, OidcClientError> {
    let url = Url::parse(response_url)
        .map_err(|e| OidcClientError::ParseError(format!("callback url: {e}")))?;

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if !params.is_empty() {
        return Ok(params);
    }

    Ok(url
        .fragment()
        .map(|f| url::form_urlencoded::parse(f.as_bytes()).into_owned().collect())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client.
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn provider() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": server.uri(),
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "userinfo_endpoint": format!("{}/userinfo", server.uri()),
            })))
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> OidcClient {
        let options = OidcClientOptions::new(format!("{}/", server.uri()), "app", "openid profile");
        OidcClient::new(options, Client::new())
    }

    fn id_token(payload: &serde_json::Value) -> String {
        format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(payload.to_string()))
    }

    /// Validates `OidcClient::prepare_login` behavior for the authorization
    /// url scenario.
    ///
    /// Assertions:
    /// - Ensures the url targets the discovered authorization endpoint.
    /// - Ensures PKCE, state, nonce and extra parameters are present.
    #[tokio::test]
    async fn test_prepare_login_builds_authorization_url() {
        let server = provider().await;
        let client = client_for(&server);

        let request =
            client.prepare_login("http://127.0.0.1:7890/", &[("prompt", "login")]).await.unwrap();

        let url = Url::parse(&request.start_url).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/authorize");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "app");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:7890/");
        assert_eq!(params["state"], request.state);
        assert_eq!(params["nonce"], request.nonce);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["prompt"], "login");
    }

    /// Validates `OidcClient::process_response` behavior for the provider
    /// error scenario.
    ///
    /// Assertions:
    /// - Confirms the provider's error code and description are surfaced.
    #[tokio::test]
    async fn test_process_response_reports_provider_error() {
        let server = provider().await;
        let client = client_for(&server);
        let request = client.prepare_login("http://127.0.0.1:1/", &[]).await.unwrap();

        let outcome = client
            .process_response(
                "http://127.0.0.1:1/?error=access_denied&error_description=User%20cancelled",
                &request,
            )
            .await;

        let failure = outcome.error().unwrap();
        assert_eq!(failure.error, "access_denied");
        assert_eq!(failure.description.as_deref(), Some("User cancelled"));
    }

    #[tokio::test]
    async fn test_process_response_rejects_state_mismatch() {
        let server = provider().await;
        let client = client_for(&server);
        let request = client.prepare_login("http://127.0.0.1:1/", &[]).await.unwrap();

        let outcome =
            client.process_response("http://127.0.0.1:1/?code=abc&state=forged", &request).await;

        assert_eq!(outcome.error().map(|f| f.error.as_str()), Some("invalid_state"));
        assert!(server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .all(|r| r.url.path() != "/token"));
    }

    /// Validates `OidcClient::process_response` behavior for the successful
    /// code exchange scenario.
    ///
    /// Assertions:
    /// - Confirms tokens and ID token claims are returned.
    /// - Ensures the PKCE verifier is sent to the token endpoint.
    #[tokio::test]
    async fn test_process_response_exchanges_code() {
        let server = provider().await;
        let client = client_for(&server);
        let request = client.prepare_login("http://127.0.0.1:1/", &[]).await.unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains(format!("code_verifier={}", request.code_verifier)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "id_token": id_token(&json!({"sub": "u1", "name": "Ada", "nonce": request.nonce})),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("http://127.0.0.1:1/?code=abc&state={}", request.state);
        let outcome = client.process_response(&url, &request).await;

        let tokens = outcome.tokens().expect("login should succeed");
        assert_eq!(tokens.tokens.access_token, "at-1");
        assert_eq!(tokens.tokens.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(tokens.claims.get("sub").as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_process_response_rejects_nonce_mismatch() {
        let server = provider().await;
        let client = client_for(&server);
        let request = client.prepare_login("http://127.0.0.1:1/", &[]).await.unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-1",
                "id_token": id_token(&json!({"sub": "u1", "nonce": "replayed"})),
            })))
            .mount(&server)
            .await;

        let url = format!("http://127.0.0.1:1/?code=abc&state={}", request.state);
        let outcome = client.process_response(&url, &request).await;

        assert_eq!(outcome.error().map(|f| f.error.as_str()), Some("invalid_nonce"));
    }

    /// Validates `OidcClient::process_response` behavior for an ID token
    /// that omits the nonce.
    ///
    /// Assertions:
    /// - Ensures the login fails with `invalid_nonce`.
    #[tokio::test]
    async fn test_process_response_rejects_missing_nonce() {
        let server = provider().await;
        let client = client_for(&server);
        let request = client.prepare_login("http://127.0.0.1:1/", &[]).await.unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-1",
                "id_token": id_token(&json!({"sub": "u1", "name": "Ada"})),
            })))
            .mount(&server)
            .await;

        let url = format!("http://127.0.0.1:1/?code=abc&state={}", request.state);
        let outcome = client.process_response(&url, &request).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.error().map(|f| f.error.as_str()), Some("invalid_nonce"));
    }

    #[tokio::test]
    async fn test_token_endpoint_error_is_reported() {
        let server = provider().await;
        let client = client_for(&server);
        let request = client.prepare_login("http://127.0.0.1:1/", &[]).await.unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "code expired",
            })))
            .mount(&server)
            .await;

        let url = format!("http://127.0.0.1:1/?code=abc&state={}", request.state);
        let outcome = client.process_response(&url, &request).await;

        assert_eq!(outcome.error().map(|f| f.error.as_str()), Some("invalid_grant"));
    }

    #[tokio::test]
    async fn test_end_session_url_carries_post_logout_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "end_session_endpoint": format!("{}/logout", server.uri()),
            })))
            .mount(&server)
            .await;
        let options = OidcClientOptions::new(server.uri(), "app", "openid")
            .with_post_logout_redirect_uri(Some("http://127.0.0.1:7890/".into()));
        let client = OidcClient::new(options, Client::new());

        let url = client.end_session_url(Some("idt")).await.unwrap().unwrap();
        let url = Url::parse(&url).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/logout");
        assert_eq!(params["client_id"], "app");
        assert_eq!(params["post_logout_redirect_uri"], "http://127.0.0.1:7890/");
        assert_eq!(params["id_token_hint"], "idt");
    }

    #[tokio::test]
    async fn test_end_session_url_absent_without_endpoint() {
        let server = provider().await;
        let client = client_for(&server);
        assert_eq!(client.end_session_url(None).await.unwrap(), None);
    }

    /// Validates `OidcClient::discovery` behavior for the transient failure
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a failed fetch is not cached.
    /// - Ensures a successful fetch is cached.
    #[tokio::test]
    async fn test_discovery_failure_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "userinfo_endpoint": "https://id.example.com/userinfo",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(client.discovery().await, Err(OidcClientError::HttpStatus(503))));

        let doc = client.discovery().await.unwrap();
        assert_eq!(doc.userinfo_endpoint.as_deref(), Some("https://id.example.com/userinfo"));
        client.discovery().await.unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }
}
