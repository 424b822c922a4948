//! Session change notifications
//!
//! Providers publish on a `tokio::sync::broadcast` channel; receivers that
//! lag simply miss intermediate events and should re-query state.

use serde::{Deserialize, Serialize};

/// Change published by an identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The set of users visible through the provider changed (login,
    /// token save, explicit refresh).
    UsersChanged { provider_key: String },
}

impl SessionEvent {
    /// Provider that published the event
    #[must_use]
    pub fn provider_key(&self) -> &str {
        match self {
            Self::UsersChanged { provider_key } => provider_key,
        }
    }
}
