//! Security primitives and utilities
//!
//! Namespaced secret storage: the [`SecureStorage`] abstraction and its
//! platform keychain implementation.

pub mod keychain;
pub mod traits;

pub use keychain::{KeychainError, KeyringStorage};
pub use traits::SecureStorage;
