//! # Flowery Infrastructure
//!
//! Infrastructure implementations of the identity-provider ports in
//! `flowery-core`.
//!
//! This crate contains:
//! - HTTP client with retry support
//! - Configuration loading from environment and files
//! - The OpenID Connect integration: transport selection (platform broker
//!   or loopback callback server), session persistence and profile
//!   resolution
//!
//! ## Architecture
//! - Implements traits defined in `flowery-core`
//! - Depends on `flowery-common` and `flowery-domain`
//! - Contains all "impure" code (network I/O, secure storage, browser)

pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use integrations::oidc::{
    BrokerError, BrokerResponse, BrokerStatus, BrowserLauncher, LoopbackCallbackServer,
    LoopbackOutcome, OAuthUserProvider, OAuthUserProviderBuilder, OidcAuthCoordinator,
    SystemBrowser, TransportCapability, TransportSelector, TransportState, WebAuthBroker,
};
