//! Mock implementations of common traits
//!
//! Provides mock objects for testing purposes.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::security::{KeychainError, SecureStorage};

type StorageData = Arc<Mutex<BTreeMap<(String, String), String>>>;

/// In-memory [`SecureStorage`]
///
/// Clones share the same backing map, so a test can hand one clone to the
/// code under test and inspect another. Reads and writes can be made to
/// fail independently.
#[derive(Debug, Clone, Default)]
pub struct MockSecureStorage {
    storage: StorageData,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MockSecureStorage {
    /// Create an empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without counting it as a write.
    #[must_use]
    pub fn with_value(self, namespace: &str, key: &str, value: &str) -> Self {
        self.storage.lock().insert((namespace.to_string(), key.to_string()), value.to_string());
        self
    }

    /// Make every `get_value` call fail.
    pub fn fail_reads(&self, enabled: bool) {
        self.fail_reads.store(enabled, Ordering::SeqCst);
    }

    /// Make every `set_value`/`remove_value` call fail.
    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    /// Current value, bypassing failure injection.
    #[must_use]
    pub fn value(&self, namespace: &str, key: &str) -> Option<String> {
        self.storage.lock().get(&(namespace.to_string(), key.to_string())).cloned()
    }

    /// Keys stored under `namespace`.
    #[must_use]
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        self.storage
            .lock()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Whether nothing is stored under `namespace`.
    #[must_use]
    pub fn is_empty(&self, namespace: &str) -> bool {
        self.keys(namespace).is_empty()
    }

    /// Successful `set_value` calls so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writes(&self) -> Result<(), KeychainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed("mock write failure".into()));
        }
        Ok(())
    }
}

impl SecureStorage for MockSecureStorage {
    fn set_value(&self, namespace: &str, key: &str, value: &str) -> Result<(), KeychainError> {
        self.check_writes()?;
        self.storage.lock().insert((namespace.to_string(), key.to_string()), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_value(&self, namespace: &str, key: &str) -> Result<Option<String>, KeychainError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed("mock read failure".into()));
        }
        Ok(self.value(namespace, key))
    }

    fn remove_value(&self, namespace: &str, key: &str) -> Result<(), KeychainError> {
        self.check_writes()?;
        self.storage.lock().remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_isolated() {
        let storage = MockSecureStorage::new();
        storage.set_value("a", "k", "1").unwrap();
        storage.set_value("b", "k", "2").unwrap();

        assert_eq!(storage.get_value("a", "k").unwrap().as_deref(), Some("1"));
        assert_eq!(storage.keys("b"), vec!["k".to_string()]);
        storage.remove_value("a", "k").unwrap();
        assert!(storage.is_empty("a"));
        assert!(!storage.is_empty("b"));
    }

    #[test]
    fn injected_failures_leave_data_untouched() {
        let storage = MockSecureStorage::new().with_value("a", "k", "1");
        storage.fail_writes(true);
        storage.fail_reads(true);

        assert!(storage.set_value("a", "k", "2").is_err());
        assert!(storage.remove_value("a", "k").is_err());
        assert!(storage.get_value("a", "k").is_err());
        assert_eq!(storage.value("a", "k").as_deref(), Some("1"));
        assert_eq!(storage.write_count(), 0);
    }
}
