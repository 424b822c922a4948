//! Configuration structures
//!
//! Deserialized from TOML/JSON files or assembled from environment variables
//! by the infrastructure loader.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BROWSER_TIMEOUT_SECS, DEFAULT_HTTP_MAX_ATTEMPTS, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_LOOPBACK_PORT, DEFAULT_SCOPE,
};
use crate::errors::{FloweryError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: Vec<OidcProviderConfig>,
    #[serde(default)]
    pub http: HttpSettings,
}

impl Config {
    /// Find the provider connection registered under `provider_key`.
    #[must_use]
    pub fn provider(&self, provider_key: &str) -> Option<&OidcProviderConfig> {
        self.providers.iter().find(|p| p.provider_key == provider_key)
    }
}

/// One configured OpenID Connect identity provider connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcProviderConfig {
    /// Short key used for storage namespacing and composite ids
    pub provider_key: String,
    #[serde(default)]
    pub display_name: String,
    /// Issuer base URL; the discovery document lives under it
    pub authority: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Redirect URI registered with the provider. When unset the broker's
    /// callback URI (broker transport) or the loopback URI is used.
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default = "default_true")]
    pub load_token_from_storage: bool,
    /// Port for the loopback callback listener; `0` picks an ephemeral port.
    #[serde(default = "default_loopback_port")]
    pub loopback_port: u16,
    #[serde(default)]
    pub browser_timeout_seconds: Option<u64>,
    #[serde(default = "default_true")]
    pub supports_avatars: bool,
    #[serde(default)]
    pub supports_presence: bool,
    #[serde(default)]
    pub supports_realtime: bool,
}

impl OidcProviderConfig {
    /// Minimal configuration with defaults for every optional field.
    pub fn new(
        provider_key: impl Into<String>,
        authority: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        let provider_key = provider_key.into();
        Self {
            display_name: provider_key.clone(),
            provider_key,
            authority: authority.into(),
            client_id: client_id.into(),
            client_secret: None,
            scope: default_scope(),
            redirect_uri: None,
            post_logout_redirect_uri: None,
            load_token_from_storage: true,
            loopback_port: DEFAULT_LOOPBACK_PORT,
            browser_timeout_seconds: None,
            supports_avatars: true,
            supports_presence: false,
            supports_realtime: false,
        }
    }

    /// Check the required fields.
    ///
    /// # Errors
    /// Returns `FloweryError::Config` when the provider key, authority or
    /// client id is blank.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("provider_key", &self.provider_key),
            ("authority", &self.authority),
            ("client_id", &self.client_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(FloweryError::Config(format!("OIDC provider {name} is required")));
            }
        }
        Ok(())
    }

    /// Authority with any trailing slash removed.
    #[must_use]
    pub fn authority_base(&self) -> &str {
        self.authority.trim_end_matches('/')
    }

    /// Name shown to users, falling back to the provider key.
    #[must_use]
    pub fn effective_display_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.provider_key
        } else {
            &self.display_name
        }
    }

    /// Loopback wait timeout; unset or zero means the default five minutes.
    #[must_use]
    pub fn browser_timeout(&self) -> Duration {
        match self.browser_timeout_seconds {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => Duration::from_secs(DEFAULT_BROWSER_TIMEOUT_SECS),
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_http_attempts")]
    pub max_attempts: usize,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECS,
            max_attempts: DEFAULT_HTTP_MAX_ATTEMPTS,
            user_agent: None,
        }
    }
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_loopback_port() -> u16 {
    DEFAULT_LOOPBACK_PORT
}

const fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

const fn default_http_attempts() -> usize {
    DEFAULT_HTTP_MAX_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_provider_with_defaults() {
        let json = r#"{
            "providers": [
                { "provider_key": "corp", "authority": "https://id.example.com/", "client_id": "app" }
            ]
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        let provider = config.provider("corp").unwrap();

        assert_eq!(provider.scope, "openid profile email");
        assert_eq!(provider.loopback_port, 7890);
        assert!(provider.load_token_from_storage);
        assert_eq!(provider.authority_base(), "https://id.example.com");
        assert_eq!(provider.effective_display_name(), "corp");
        assert_eq!(config.http.max_attempts, 1);
    }

    #[test]
    fn zero_browser_timeout_uses_default() {
        let mut provider = OidcProviderConfig::new("corp", "https://id", "app");
        provider.browser_timeout_seconds = Some(0);
        assert_eq!(provider.browser_timeout(), Duration::from_secs(300));

        provider.browser_timeout_seconds = Some(12);
        assert_eq!(provider.browser_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn validate_rejects_blank_required_fields() {
        let provider = OidcProviderConfig::new("corp", " ", "app");
        assert!(matches!(provider.validate(), Err(FloweryError::Config(_))));
        assert!(OidcProviderConfig::new("corp", "https://id", "app").validate().is_ok());
    }
}
