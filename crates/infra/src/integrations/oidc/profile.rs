//! Claim mapping and single-flight profile resolution.

use flowery_common::auth::Claims;
use flowery_core::CancellationToken;
use flowery_domain::UserProfile;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::discovery::DiscoveryResolver;
use super::session::SessionStore;
use crate::http::HttpClient;

const RAW_ID_CLAIMS: [&str; 4] = ["sub", "id", "email", "preferred_username"];
const DISPLAY_NAME_CLAIMS: [&str; 3] = ["name", "preferred_username", "email"];

/// Map ID-token claims to a profile. `None` when no raw id can be found.
pub fn profile_from_claims(provider_key: &str, claims: &Claims) -> Option<UserProfile> {
    let raw_id = claims.first_of(&RAW_ID_CLAIMS)?;
    let display_name = claims.first_of(&DISPLAY_NAME_CLAIMS).unwrap_or_else(|| raw_id.clone());

    UserProfile::new(provider_key, &raw_id, &display_name).map(|profile| {
        profile.with_email(claims.get("email")).with_avatar_url(claims.get("picture"))
    })
}

/// Map a user-info response body. Non-object bodies yield `None`.
pub fn profile_from_userinfo(provider_key: &str, body: Value) -> Option<UserProfile> {
    let claims = Claims::from_value(body)?;
    profile_from_claims(provider_key, &claims)
        .map(|profile| profile.with_title(claims.get("title")).with_department(claims.get("department")))
}

#[derive(Default)]
struct ResolverState {
    userinfo_endpoint: Option<String>,
}

/// Answers "who is signed in" with at most one user-info fetch in flight.
pub struct ProfileResolver {
    provider_key: String,
    discovery: DiscoveryResolver,
    http: HttpClient,
    state: Mutex<ResolverState>,
}

impl ProfileResolver {
    pub fn new(provider_key: impl Into<String>, discovery: DiscoveryResolver, http: HttpClient) -> Self {
        Self {
            provider_key: provider_key.into(),
            discovery,
            http,
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// Resolve the current profile: memory, then the persisted snapshot, then
    /// the user-info endpoint.
    ///
    /// `cancel` is only checked before the lock is taken; a fetch that has
    /// started runs to completion. Every failure resolves to `None`.
    pub async fn resolve(
        &self,
        session: &SessionStore,
        cancel: &CancellationToken,
    ) -> Option<UserProfile> {
        let token = session.access_token().filter(|t| !t.trim().is_empty())?;

        if let Some(profile) = session.cached_profile() {
            return Some(profile);
        }

        if let Some(snapshot) = session.load_snapshot() {
            session.cache_profile(&token, &snapshot, false);
            return Some(snapshot);
        }

        if cancel.is_cancelled() {
            return None;
        }

        let mut state = self.state.lock().await;

        // Another caller may have finished while we waited.
        if let Some(profile) = session.cached_profile() {
            return Some(profile);
        }

        let endpoint = match state.userinfo_endpoint.clone() {
            Some(endpoint) => endpoint,
            None => {
                let endpoint = self.discovery.userinfo_endpoint().await?;
                state.userinfo_endpoint = Some(endpoint.clone());
                endpoint
            }
        };

        let body = match self.http.get_json_with_bearer(&endpoint, &token).await {
            Ok(body) => body,
            Err(err) => {
                warn!(provider = %self.provider_key, error = %err, "user-info request failed");
                return None;
            }
        };

        let Some(profile) = profile_from_userinfo(&self.provider_key, body) else {
            debug!(provider = %self.provider_key, "user-info response has no usable identifier");
            return None;
        };

        session.cache_profile(&token, &profile, true);
        debug!(provider = %self.provider_key, "user profile resolved from user-info endpoint");
        Some(profile)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn display_name_falls_back_to_preferred_username() {
        let profile =
            profile_from_userinfo("corp", json!({ "sub": "u2", "preferred_username": "ada2" }))
                .unwrap();
        assert_eq!(profile.display_name, "ada2");
        assert_eq!(profile.composite_id, "corp:u2");
    }

    #[test]
    fn display_name_falls_back_to_raw_id() {
        let profile = profile_from_userinfo("corp", json!({ "sub": "u3" })).unwrap();
        assert_eq!(profile.display_name, "u3");
    }

    #[test]
    fn raw_id_chain_skips_blank_values() {
        let profile = profile_from_userinfo(
            "corp",
            json!({ "sub": " ", "id": "", "email": "ada@x.com", "title": "Engineer" }),
        )
        .unwrap();
        assert_eq!(profile.raw_id, "ada@x.com");
        assert_eq!(profile.display_name, "ada@x.com");
        assert_eq!(profile.title.as_deref(), Some("Engineer"));
    }

    #[test]
    fn non_string_identifiers_are_ignored() {
        let profile =
            profile_from_userinfo("gh", json!({ "id": 42, "email": "a@x.com", "name": 7 })).unwrap();
        assert_eq!(profile.raw_id, "a@x.com");
        assert_eq!(profile.composite_id, "gh:a@x.com");
        assert_eq!(profile.display_name, "a@x.com");

        assert!(profile_from_userinfo("gh", json!({ "sub": 1, "id": true })).is_none());
    }

    #[test]
    fn no_identifier_means_no_profile() {
        assert!(profile_from_userinfo("corp", json!({ "name": "Nobody" })).is_none());
        assert!(profile_from_userinfo("corp", json!(["sub"])).is_none());
    }

    #[test]
    fn claims_mapping_ignores_title_and_department() {
        let claims: Claims = [("sub", "u1"), ("name", "Ada"), ("picture", "https://img"), ("title", "CTO")]
            .into_iter()
            .collect();
        let profile = profile_from_claims("corp", &claims).unwrap();
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img"));
        assert!(profile.title.is_none());
    }
}
