//! OpenID Connect identity provider integration
//!
//! ```text
//! OAuthUserProvider ──► OidcAuthCoordinator ──► TransportSelector
//!        │                     │                   ├─ WebAuthBroker (host supplied)
//!        │                     │                   └─ LoopbackCallbackServer
//!        │                     └─ OidcClient (discovery, PKCE, code exchange)
//!        ├─► ProfileResolver ──► DiscoveryResolver ──► user-info endpoint
//!        └─► SessionStore ──► SecureStorage
//! ```

pub mod broker;
pub mod coordinator;
pub mod discovery;
pub mod loopback;
pub mod profile;
pub mod provider;
pub mod session;
pub mod transport;

pub use broker::{BrokerError, BrokerResponse, BrokerStatus, TransportCapability, WebAuthBroker};
pub use coordinator::OidcAuthCoordinator;
pub use discovery::DiscoveryResolver;
pub use loopback::{
    random_unused_port, redirect_uri_for_port, BrowserLauncher, LoopbackCallbackServer,
    LoopbackOutcome, SystemBrowser,
};
pub use profile::{profile_from_claims, profile_from_userinfo, ProfileResolver};
pub use provider::{OAuthUserProvider, OAuthUserProviderBuilder};
pub use session::{namespace_for, SessionStore};
pub use transport::{TransportSelector, TransportState};
