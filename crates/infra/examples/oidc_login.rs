//! Example: Interactive OpenID Connect login through the loopback flow
//!
//! Loads the provider configuration, opens the system browser for sign-in and
//! prints the resolved profile.
//!
//! # Setup
//!
//! 1. Register a public client with your identity provider and allow the
//!    redirect URI `http://127.0.0.1:7890/`.
//!
//! 2. Configure it through a `.env` file or the environment:
//!    ```bash
//!    export FLOWERY_OIDC_PROVIDER_KEY=corp
//!    export FLOWERY_OIDC_AUTHORITY=https://id.example.com
//!    export FLOWERY_OIDC_CLIENT_ID=flowery-desktop
//!    ```
//!    or place a `flowery.toml` next to the working directory.
//!
//! 3. Run this example:
//!    ```bash
//!    RUST_LOG=flowery_infra=debug cargo run --example oidc_login
//!    ```

use std::sync::Arc;

use flowery_common::security::KeyringStorage;
use flowery_core::{InteractiveAuthProvider, TokenStateProvider, UserDirectory};
use flowery_infra::{config, OAuthUserProvider, TransportCapability};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::load()?;
    let provider_config = config
        .providers
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no identity provider configured"))?;

    let provider = OAuthUserProvider::builder(provider_config)
        .storage(Arc::new(KeyringStorage))
        .transport(TransportCapability::LoopbackOnly)
        .http_settings(config.http)
        .build()?;

    let cancel = CancellationToken::new();
    if provider.has_token() {
        println!("Restored a saved session for {}", provider.metadata().display_name);
    } else {
        println!("Opening the browser to sign in to {}...", provider.metadata().display_name);
        if !provider.authenticate(&cancel).await {
            anyhow::bail!("sign-in did not complete");
        }
    }

    match provider.get_current_user(&cancel).await {
        Some(user) => {
            println!("Signed in as {} ({})", user.display_name, user.composite_id);
            if let Some(email) = user.email {
                println!("  email: {email}");
            }
        }
        None => println!("Signed in, but the profile could not be resolved"),
    }

    Ok(())
}
