//! Modular common utilities shared across Flowery crates.
//!
//! # Safety and Quality
//!
//! This crate enforces strict safety and quality standards to ensure
//! reliability across all Flowery components.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: pure helpers (PKCE material, claim decoding types)
//! - `runtime`: async OIDC client (discovery, code exchange)
//! - `platform`: platform integrations (keyring-backed secure storage)
//! - `observability`: tracing (pulled in by `runtime`)
//! - `test-utils`: in-memory mocks for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod auth;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", all(test, feature = "platform")))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{Claims, LoginOutcome, OidcClient, OidcClientError, OidcClientOptions};
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeyringStorage, SecureStorage};
