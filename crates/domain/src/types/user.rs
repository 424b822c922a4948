//! User profile types
//!
//! The identity resolved for the signed-in account of one provider
//! connection, either from ID-token claims or from the user-info endpoint.

use serde::{Deserialize, Serialize};

use crate::utils::user_id;

/// Resolved identity of the authenticated user
///
/// A profile always carries a non-blank `raw_id` and `display_name`; use
/// [`UserProfile::new`] to enforce that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider-local identifier (subject claim or fallback)
    pub raw_id: String,
    /// `providerKey:rawId`, unique across providers
    pub composite_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
}

impl UserProfile {
    /// Build a profile for `provider_key`.
    ///
    /// A blank `display_name` falls back to the raw id. Returns `None` when
    /// `raw_id` is blank.
    ///
    /// # Examples
    /// ```
    /// use flowery_domain::UserProfile;
    ///
    /// let profile = UserProfile::new("github", "12345", "").unwrap();
    /// assert_eq!(profile.composite_id, "github:12345");
    /// assert_eq!(profile.display_name, "12345");
    /// assert!(UserProfile::new("github", "  ", "Ada").is_none());
    /// ```
    #[must_use]
    pub fn new(provider_key: &str, raw_id: &str, display_name: &str) -> Option<Self> {
        let raw_id = raw_id.trim();
        if raw_id.is_empty() {
            return None;
        }

        let display_name =
            if display_name.trim().is_empty() { raw_id } else { display_name.trim() };

        Some(Self {
            raw_id: raw_id.to_string(),
            composite_id: user_id::compose(provider_key, raw_id),
            display_name: display_name.to_string(),
            email: None,
            avatar_url: None,
            title: None,
            department: None,
        })
    }

    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = non_blank(email);
        self
    }

    #[must_use]
    pub fn with_avatar_url(mut self, avatar_url: Option<String>) -> Self {
        self.avatar_url = non_blank(avatar_url);
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = non_blank(title);
        self
    }

    #[must_use]
    pub fn with_department(mut self, department: Option<String>) -> Self {
        self.department = non_blank(department);
        self
    }

    /// Provider key encoded in the composite id, if any.
    #[must_use]
    pub fn provider_key(&self) -> Option<&str> {
        user_id::parse(&self.composite_id).0
    }

    /// Whether `id` names this profile, by composite id or raw id.
    #[must_use]
    pub fn matches_id(&self, id: &str) -> bool {
        self.composite_id == id || self.raw_id == id
    }

    /// Case-insensitive substring match against display name or email.
    ///
    /// A blank query matches every profile.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }

        let needle = query.to_lowercase();
        self.display_name.to_lowercase().contains(&needle)
            || self.email.as_deref().is_some_and(|email| email.to_lowercase().contains(&needle))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
