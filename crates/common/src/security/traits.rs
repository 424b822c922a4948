//! Trait abstractions for security components

use super::keychain::KeychainError;

/// Namespaced key/value storage for string secrets
///
/// Implementations must be safe for concurrent use; callers do not add
/// their own locking.
pub trait SecureStorage: Send + Sync {
    /// Store `value` under `namespace`/`key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns `KeychainError` if the backing store rejects the write.
    fn set_value(&self, namespace: &str, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Read the value under `namespace`/`key`; `Ok(None)` when absent.
    ///
    /// # Errors
    /// Returns `KeychainError` if the backing store cannot be read.
    fn get_value(&self, namespace: &str, key: &str) -> Result<Option<String>, KeychainError>;

    /// Remove the value under `namespace`/`key`. Removing a missing entry
    /// succeeds.
    ///
    /// # Errors
    /// Returns `KeychainError` if the backing store rejects the removal.
    fn remove_value(&self, namespace: &str, key: &str) -> Result<(), KeychainError>;
}
