//! Platform keychain storage for secrets
//!
//! Thin wrapper over the `keyring` crate: macOS (Keychain Access), Windows
//! (Credential Manager) and Linux (Secret Service API). The storage
//! namespace maps to the keyring service and the key to the account.
//!
//! ## Usage
//!
//! ```no_run
//! use flowery_common::security::{KeyringStorage, SecureStorage};
//!
//! let storage = KeyringStorage::new();
//! storage.set_value("Flowery.OAuth.github", "AccessToken", "secret")?;
//! assert_eq!(
//!     storage.get_value("Flowery.OAuth.github", "AccessToken")?.as_deref(),
//!     Some("secret")
//! );
//! # Ok::<(), flowery_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use super::traits::SecureStorage;

/// Keychain-related errors
#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// [`SecureStorage`] backed by the platform keychain
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStorage;

impl KeyringStorage {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn entry(namespace: &str, key: &str) -> Result<Entry, KeychainError> {
        Entry::new(namespace, key).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keyring entry {key}: {e}"))
        })
    }
}

impl SecureStorage for KeyringStorage {
    fn set_value(&self, namespace: &str, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %namespace, key = %key, "Storing secret in keychain");

        Self::entry(namespace, key)?.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })
    }

    fn get_value(&self, namespace: &str, key: &str) -> Result<Option<String>, KeychainError> {
        debug!(service = %namespace, key = %key, "Retrieving secret from keychain");

        match Self::entry(namespace, key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to retrieve secret for {key}: {e}"
            ))),
        }
    }

    fn remove_value(&self, namespace: &str, key: &str) -> Result<(), KeychainError> {
        debug!(service = %namespace, key = %key, "Deleting secret from keychain");

        match Self::entry(namespace, key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }
}
