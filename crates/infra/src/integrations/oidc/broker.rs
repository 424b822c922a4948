//! Platform web-authentication broker port.
//!
//! Hosts that have a system-provided OAuth sheet implement
//! [`WebAuthBroker`] and hand it to the provider as
//! [`TransportCapability::Broker`]; everything else runs the loopback flow.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use flowery_core::CancellationToken;
use thiserror::Error;

/// Terminal status reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerStatus {
    Success,
    UserCancel,
    ErrorHttp,
}

impl fmt::Display for BrokerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "Success",
            Self::UserCancel => "UserCancel",
            Self::ErrorHttp => "ErrorHttp",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerResponse {
    pub status: BrokerStatus,
    /// Full redirect URL on success.
    pub data: Option<String>,
}

impl BrokerResponse {
    pub fn success(data: impl Into<String>) -> Self {
        Self { status: BrokerStatus::Success, data: Some(data.into()) }
    }

    pub fn with_status(status: BrokerStatus) -> Self {
        Self { status, data: None }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("web authentication broker not supported: {0}")]
    NotSupported(String),

    #[error("web authentication broker not implemented: {0}")]
    NotImplemented(String),

    #[error("web authentication broker failed: {0}")]
    Failed(String),
}

impl BrokerError {
    /// Errors that permanently switch the process to the loopback flow.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::NotSupported(_) | Self::NotImplemented(_))
    }
}

#[async_trait]
pub trait WebAuthBroker: Send + Sync {
    /// Callback URI the broker intercepts.
    fn callback_uri(&self) -> Result<String, BrokerError>;

    async fn authenticate(
        &self,
        start_url: &str,
        callback_uri: &str,
        cancel: &CancellationToken,
    ) -> Result<BrokerResponse, BrokerError>;
}

/// What the host platform can offer for interactive login, decided once at
/// startup.
#[derive(Clone, Default)]
pub enum TransportCapability {
    Broker(Arc<dyn WebAuthBroker>),
    #[default]
    LoopbackOnly,
}

impl fmt::Debug for TransportCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broker(_) => f.write_str("Broker"),
            Self::LoopbackOnly => f.write_str("LoopbackOnly"),
        }
    }
}
