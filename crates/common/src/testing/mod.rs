//! Testing utilities and helpers
//!
//! - **[`mocks`]**: in-memory implementations of storage traits with
//!   failure injection
//!
//! ## Usage
//!
//! ```rust
//! use flowery_common::security::SecureStorage;
//! use flowery_common::testing::MockSecureStorage;
//!
//! let storage = MockSecureStorage::new();
//! storage.set_value("ns", "AccessToken", "abc").unwrap();
//! assert_eq!(storage.value("ns", "AccessToken").as_deref(), Some("abc"));
//! ```

pub mod mocks;

pub use mocks::MockSecureStorage;
