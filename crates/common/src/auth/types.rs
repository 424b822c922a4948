//! OpenID Connect types and structures
//!
//! Wire formats for the discovery document and token endpoint, plus the
//! transient state carried between building an authorization request and
//! processing its response.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::claims::Claims;

/// Static settings for one OIDC client registration
#[derive(Debug, Clone)]
pub struct OidcClientOptions {
    /// Issuer base URL (trailing slash is ignored)
    pub authority: String,

    /// OAuth client ID
    pub client_id: String,

    /// Confidential clients only; sent to the token endpoint when present
    pub client_secret: Option<String>,

    /// Space-separated scopes
    pub scope: String,

    /// Where the provider sends the browser after sign-out
    pub post_logout_redirect_uri: Option<String>,
}

impl OidcClientOptions {
    /// Create options for a public client.
    pub fn new(
        authority: impl Into<String>,
        client_id: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            authority: authority.into(),
            client_id: client_id.into(),
            client_secret: None,
            scope: scope.into(),
            post_logout_redirect_uri: None,
        }
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: Option<String>) -> Self {
        self.client_secret = secret.filter(|s| !s.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, uri: Option<String>) -> Self {
        self.post_logout_redirect_uri = uri.filter(|u| !u.trim().is_empty());
        self
    }

    /// Authority without a trailing slash
    #[must_use]
    pub fn authority_base(&self) -> &str {
        self.authority.trim_end_matches('/')
    }

    /// `<authority>/.well-known/openid-configuration`
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.authority_base())
    }
}

/// Subset of the provider metadata document (OpenID Connect Discovery 1.0)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

/// OAuth 2.0 access and refresh tokens with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    /// Optional because some providers don't issue refresh tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token (JWT) containing user claims
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    pub token_type: String,

    /// Access token lifetime in seconds, 0 when the provider omitted it
    pub expires_in: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Create a `TokenSet`, deriving `expires_at` from `expires_in`.
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_in: i64,
        scope: Option<String>,
    ) -> Self {
        let expires_at = if expires_in > 0 {
            Some(Utc::now() + chrono::Duration::seconds(expires_in))
        } else {
            None
        };

        Self {
            access_token,
            refresh_token,
            id_token,
            token_type: "Bearer".to_string(),
            expires_in,
            expires_at,
            scope,
        }
    }
}

/// Token endpoint response (RFC 6749 section 5.1)
///
/// Fields are lenient so a missing access token can be reported as a login
/// failure instead of a parse error.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a [`TokenSet`]; `None` when no access token was issued.
    #[must_use]
    pub fn into_token_set(self) -> Option<TokenSet> {
        let access_token = self.access_token.filter(|t| !t.trim().is_empty())?;
        let mut tokens = TokenSet::new(
            access_token,
            self.refresh_token.filter(|t| !t.trim().is_empty()),
            self.id_token.filter(|t| !t.trim().is_empty()),
            self.expires_in.unwrap_or_default(),
            self.scope,
        );
        if let Some(token_type) = self.token_type {
            tokens.token_type = token_type;
        }
        Some(tokens)
    }
}

/// OAuth error response from authorization server (RFC 6749 section 5.2)
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}

/// A prepared authorization request
///
/// Holds the browser start URL and the secrets needed to validate and
/// redeem the response. Single use.
#[derive(Debug, Clone)]
pub struct AuthorizeState {
    pub start_url: String,
    pub redirect_uri: String,
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
}

/// Tokens and user claims from a successful login
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub tokens: TokenSet,
    pub claims: Claims,
}

/// Why a login did not produce tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailure {
    /// Short machine-readable code (`access_denied`, `invalid_state`, ...)
    pub error: String,
    pub description: Option<String>,
}

impl fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Result of one interactive login attempt
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Success(LoginTokens),
    Failure(LoginFailure),
}

impl LoginOutcome {
    /// Build a failed outcome.
    pub fn failure(error: impl Into<String>, description: Option<String>) -> Self {
        Self::Failure(LoginFailure { error: error.into(), description })
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Tokens when the login succeeded
    #[must_use]
    pub const fn tokens(&self) -> Option<&LoginTokens> {
        match self {
            Self::Success(tokens) => Some(tokens),
            Self::Failure(_) => None,
        }
    }

    /// Failure details when the login did not succeed
    #[must_use]
    pub const fn error(&self) -> Option<&LoginFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}
