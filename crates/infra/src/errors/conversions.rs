//! Mapping of HTTP, keychain, OIDC and broker failures onto `FloweryError`.

use flowery_common::auth::OidcClientError;
use flowery_common::security::KeychainError;
use flowery_domain::FloweryError;
use reqwest::StatusCode;

use crate::integrations::oidc::BrokerError;

/// Infrastructure-side wrapper so foreign error types can be converted
/// without touching the domain crate.
#[derive(Debug)]
pub struct InfraError(pub FloweryError);

impl From<InfraError> for FloweryError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FloweryError> for InfraError {
    fn from(value: FloweryError) -> Self {
        Self(value)
    }
}

/// Classify a non-success status returned by the identity provider.
fn from_status(status: StatusCode) -> FloweryError {
    let message = format!(
        "HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("unknown status")
    );
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FloweryError::Auth(message),
        StatusCode::NOT_FOUND => FloweryError::NotFound(message),
        s if s.is_client_error() => FloweryError::InvalidInput(message),
        _ => FloweryError::Network(message),
    }
}

fn from_reqwest(err: &reqwest::Error) -> FloweryError {
    if err.is_timeout() {
        FloweryError::Network("identity provider request timed out".into())
    } else if err.is_connect() {
        FloweryError::Network("could not connect to identity provider".into())
    } else if let Some(status) = err.status() {
        from_status(status)
    } else {
        FloweryError::Network(err.to_string())
    }
}

impl From<reqwest::Error> for InfraError {
    fn from(value: reqwest::Error) -> Self {
        Self(from_reqwest(&value))
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        Self(match value {
            KeychainError::AccessFailed(msg) => FloweryError::Storage(msg),
            KeychainError::Keyring(keyring::Error::NoStorageAccess(err)) => {
                FloweryError::Storage(format!("secure storage unavailable: {err}"))
            }
            KeychainError::Keyring(err) => FloweryError::Security(err.to_string()),
        })
    }
}

impl From<OidcClientError> for InfraError {
    fn from(value: OidcClientError) -> Self {
        Self(match value {
            OidcClientError::RequestFailed(err) => from_reqwest(&err),
            OidcClientError::HttpStatus(code) => match StatusCode::from_u16(code) {
                Ok(status) => from_status(status),
                Err(_) => FloweryError::Network(format!("identity provider returned HTTP {code}")),
            },
            OidcClientError::OAuthError(err) => FloweryError::Auth(err.to_string()),
            OidcClientError::Discovery(msg) | OidcClientError::ConfigError(msg) => {
                FloweryError::Config(msg)
            }
            err @ (OidcClientError::StateMismatch | OidcClientError::NonceMismatch) => {
                FloweryError::Security(err.to_string())
            }
            OidcClientError::InvalidIdToken(msg) | OidcClientError::ParseError(msg) => {
                FloweryError::InvalidInput(msg)
            }
        })
    }
}

impl From<BrokerError> for InfraError {
    fn from(value: BrokerError) -> Self {
        Self(FloweryError::Auth(value.to_string()))
    }
}
