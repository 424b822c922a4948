//! External identity-provider integrations

pub mod oidc;
