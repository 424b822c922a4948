//! OpenID Connect authorization code flow primitives
//!
//! Provider-facing building blocks for interactive login. Transport
//! selection, session state and profile caching live in `flowery-infra`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   OidcClient    │  discovery + authorize URL + code exchange
//! └────────┬────────┘
//!          │
//!          ├──► PKCE utilities     (verifier, challenge, state, nonce)
//!          └──► Claims             (ID-token payload decoding)
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: wire types (`DiscoveryDocument`, `TokenSet`,
//!   `LoginOutcome`)
//! - **[`pkce`]**: PKCE challenge generation and state validation
//! - **[`claims`]**: claim lookups with blank-as-absent semantics
//! - **[`client`]**: OIDC HTTP client

pub mod claims;
pub mod client;
pub mod pkce;
pub mod types;

// Re-export commonly used types and functions
pub use claims::Claims;
pub use client::{OidcClient, OidcClientError};
pub use pkce::{
    generate_code_challenge, generate_code_verifier, generate_nonce, generate_state,
    validate_state, PkceChallenge,
};
pub use types::{
    AuthorizeState, DiscoveryDocument, LoginFailure, LoginOutcome, LoginTokens, OAuthError,
    OidcClientOptions, TokenResponse, TokenSet,
};
