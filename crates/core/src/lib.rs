//! # Flowery Core
//!
//! Pure identity-provider contracts - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for identity providers
//! - Provider metadata and session change events
//!
//! ## Architecture Principles
//! - Only depends on `flowery-domain`
//! - No HTTP, storage or platform code
//! - All external dependencies via traits

pub mod auth;

// Re-export specific items to avoid ambiguity
pub use auth::events::SessionEvent;
pub use auth::ports::{
    IdentityProvider, InteractiveAuthProvider, ProviderMetadata, TokenSaveProvider,
    TokenStateProvider, UserDirectory,
};
// Cancellation is part of every async port signature
pub use tokio_util::sync::CancellationToken;
