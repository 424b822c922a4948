//! # Flowery Domain
//!
//! Identity domain types shared by the Flowery authentication crates.
//!
//! This crate contains:
//! - The resolved [`UserProfile`] and composite user id helpers
//! - Domain error types and Result definitions
//! - OIDC provider configuration structures
//! - Secure-storage key names and protocol constants
//!
//! ## Architecture
//! - No dependencies on other Flowery crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::user_id;
