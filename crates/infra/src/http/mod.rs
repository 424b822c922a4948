//! HTTP plumbing shared by the identity-provider integrations.

mod client;

pub use client::{HttpClient, HttpClientBuilder};
