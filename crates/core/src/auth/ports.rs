//! Port interfaces for identity providers
//!
//! One provider type implements every capability; callers that need only a
//! subset depend on the narrow trait (`TokenSaveProvider`,
//! `InteractiveAuthProvider`, ...) instead of the full
//! [`IdentityProvider`].
//!
//! Query operations never fail: an unresolvable user is `None` or an empty
//! list.

use async_trait::async_trait;
use flowery_domain::UserProfile;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::events::SessionEvent;

/// Static description of a provider connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub provider_key: String,
    pub display_name: String,
    pub implementation_version: String,
    pub supports_avatars: bool,
    pub supports_presence: bool,
    pub supports_realtime: bool,
}

/// Read access to the users a provider can see
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Provider key, display name and capability flags
    fn metadata(&self) -> &ProviderMetadata;

    /// The signed-in user, resolved with the fewest network calls possible
    async fn get_current_user(&self, cancel: &CancellationToken) -> Option<UserProfile>;

    /// Match `id` against the composite or raw id of the current user
    async fn get_user_by_id(&self, id: &str, cancel: &CancellationToken) -> Option<UserProfile>;

    /// Users whose display name or email contains `query`
    /// (case-insensitive). A blank query returns everyone. `max_results` of
    /// zero means unlimited.
    async fn search_users(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Vec<UserProfile>;

    /// Every user visible through this provider
    async fn get_all_users(&self, cancel: &CancellationToken) -> Vec<UserProfile>;

    /// Ask listeners to re-query users
    async fn refresh(&self);

    /// Subscribe to [`SessionEvent`]s
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// Whether a session token is present
pub trait TokenStateProvider: Send + Sync {
    fn has_token(&self) -> bool;
}

/// Externally supplied tokens
pub trait TokenSaveProvider: Send + Sync {
    /// Replace the access token; a blank token signs the user out.
    fn save_token(&self, token: &str);
}

/// Interactive sign-in
#[async_trait]
pub trait InteractiveAuthProvider: Send + Sync {
    /// Run one interactive login. Returns `true` when a session was
    /// established.
    async fn authenticate(&self, cancel: &CancellationToken) -> bool;
}

/// Full capability set of an identity provider
pub trait IdentityProvider:
    UserDirectory + TokenStateProvider + TokenSaveProvider + InteractiveAuthProvider
{
}

impl<T> IdentityProvider for T where
    T: UserDirectory + TokenStateProvider + TokenSaveProvider + InteractiveAuthProvider
{
}
