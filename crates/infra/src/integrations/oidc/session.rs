//! In-memory session state mirrored to secure storage.
//!
//! Every storage write or removal is best-effort: a failing vault is logged
//! and the in-memory session stays usable.

use std::sync::Arc;

use flowery_common::auth::TokenSet;
use flowery_common::security::{KeychainError, SecureStorage};
use flowery_core::SessionEvent;
use flowery_domain::constants::{
    HAS_TOKEN_SENTINEL, KEY_ACCESS_TOKEN, KEY_HAS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER_AVATAR_URL,
    KEY_USER_DISPLAY_NAME, KEY_USER_EMAIL, KEY_USER_RAW_ID, PROFILE_SNAPSHOT_KEYS,
    SECURE_STORAGE_PREFIX,
};
use flowery_domain::UserProfile;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Default, Clone)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    profile: Option<UserProfile>,
}

/// Session of one provider connection.
pub struct SessionStore {
    provider_key: String,
    namespace: String,
    storage: Option<Arc<dyn SecureStorage>>,
    state: RwLock<Session>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(provider_key: impl Into<String>, storage: Option<Arc<dyn SecureStorage>>) -> Self {
        let provider_key = provider_key.into();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            namespace: namespace_for(&provider_key),
            provider_key,
            storage,
            state: RwLock::new(Session::default()),
            events,
        }
    }

    pub fn provider_key(&self) -> &str {
        &self.provider_key
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Load a persisted session. Any read failure leaves an empty session.
    pub fn restore(&self) {
        let Some(storage) = self.storage.as_deref() else {
            return;
        };

        let restored = match self.read_persisted(storage) {
            Ok(session) => session,
            Err(err) => {
                warn!(provider = %self.provider_key, error = %err, "failed to restore session; starting signed out");
                None
            }
        };

        if let Some(session) = &restored {
            info!(
                provider = %self.provider_key,
                has_profile = session.profile.is_some(),
                "restored persisted session"
            );
        }
        *self.state.write() = restored.unwrap_or_default();
    }

    fn read_persisted(&self, storage: &dyn SecureStorage) -> Result<Option<Session>, KeychainError> {
        let marker = storage.get_value(&self.namespace, KEY_HAS_TOKEN)?;
        if marker.as_deref() != Some(HAS_TOKEN_SENTINEL) {
            return Ok(None);
        }

        let access_token = non_blank(storage.get_value(&self.namespace, KEY_ACCESS_TOKEN)?);
        let refresh_token = non_blank(storage.get_value(&self.namespace, KEY_REFRESH_TOKEN)?);
        let profile = self.read_snapshot(storage)?;

        Ok(Some(Session { access_token, refresh_token, profile }))
    }

    fn read_snapshot(&self, storage: &dyn SecureStorage) -> Result<Option<UserProfile>, KeychainError> {
        let raw_id = non_blank(storage.get_value(&self.namespace, KEY_USER_RAW_ID)?);
        let display_name = non_blank(storage.get_value(&self.namespace, KEY_USER_DISPLAY_NAME)?);
        let (Some(raw_id), Some(display_name)) = (raw_id, display_name) else {
            return Ok(None);
        };

        let email = storage.get_value(&self.namespace, KEY_USER_EMAIL)?;
        let avatar_url = storage.get_value(&self.namespace, KEY_USER_AVATAR_URL)?;

        Ok(UserProfile::new(&self.provider_key, &raw_id, &display_name)
            .map(|profile| profile.with_email(email).with_avatar_url(avatar_url)))
    }

    /// Persisted profile snapshot; read failures count as a miss.
    pub fn load_snapshot(&self) -> Option<UserProfile> {
        let storage = self.storage.as_deref()?;
        match self.read_snapshot(storage) {
            Ok(profile) => profile,
            Err(err) => {
                debug!(provider = %self.provider_key, error = %err, "profile snapshot unreadable");
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().refresh_token.clone()
    }

    pub fn has_token(&self) -> bool {
        self.state.read().access_token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn cached_profile(&self) -> Option<UserProfile> {
        self.state.read().profile.clone()
    }

    /// Cache `profile` if `token` is still the current access token.
    ///
    /// With `persist` the snapshot is written to storage as well. Returns
    /// whether the profile was accepted.
    pub fn cache_profile(&self, token: &str, profile: &UserProfile, persist: bool) -> bool {
        {
            let mut state = self.state.write();
            if state.access_token.as_deref() != Some(token) {
                debug!(provider = %self.provider_key, "token changed during resolution; dropping profile");
                return false;
            }
            state.profile = Some(profile.clone());
        }

        if persist {
            self.persist_snapshot(Some(profile));
        }
        true
    }

    /// Replace the access token. A blank token signs out and wipes storage.
    pub fn save_token(&self, token: &str) {
        if token.trim().is_empty() {
            *self.state.write() = Session::default();
            self.clear_persisted();
            info!(provider = %self.provider_key, "session cleared");
        } else {
            {
                let mut state = self.state.write();
                state.access_token = Some(token.to_string());
                state.profile = None;
            }
            self.persist_snapshot(None);
            self.write(KEY_HAS_TOKEN, HAS_TOKEN_SENTINEL);
            self.write(KEY_ACCESS_TOKEN, token);
            info!(provider = %self.provider_key, "access token replaced");
        }

        self.publish_users_changed();
    }

    /// Install the tokens and profile of a successful login.
    pub fn establish(&self, tokens: &TokenSet, profile: Option<UserProfile>) {
        let access_token = non_blank(Some(tokens.access_token.clone()));
        let refresh_token = non_blank(tokens.refresh_token.clone());

        *self.state.write() = Session {
            access_token: access_token.clone(),
            refresh_token: refresh_token.clone(),
            profile: profile.clone(),
        };

        self.persist_snapshot(profile.as_ref());
        match access_token.as_deref() {
            Some(token) => {
                self.write(KEY_HAS_TOKEN, HAS_TOKEN_SENTINEL);
                self.write(KEY_ACCESS_TOKEN, token);
            }
            None => self.remove(KEY_HAS_TOKEN),
        }
        match refresh_token.as_deref() {
            Some(token) => self.write(KEY_REFRESH_TOKEN, token),
            None => self.remove(KEY_REFRESH_TOKEN),
        }

        info!(
            provider = %self.provider_key,
            has_profile = profile.is_some(),
            has_refresh_token = refresh_token.is_some(),
            "session established"
        );
    }

    pub fn publish_users_changed(&self) {
        // No receivers is fine.
        let _ = self
            .events
            .send(SessionEvent::UsersChanged { provider_key: self.provider_key.clone() });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn persist_snapshot(&self, profile: Option<&UserProfile>) {
        let Some(profile) = profile else {
            for key in PROFILE_SNAPSHOT_KEYS {
                self.remove(key);
            }
            return;
        };

        self.write(KEY_USER_RAW_ID, &profile.raw_id);
        self.write(KEY_USER_DISPLAY_NAME, &profile.display_name);
        match profile.email.as_deref() {
            Some(email) => self.write(KEY_USER_EMAIL, email),
            None => self.remove(KEY_USER_EMAIL),
        }
        match profile.avatar_url.as_deref() {
            Some(url) => self.write(KEY_USER_AVATAR_URL, url),
            None => self.remove(KEY_USER_AVATAR_URL),
        }
    }

    fn clear_persisted(&self) {
        self.persist_snapshot(None);
        for key in [KEY_HAS_TOKEN, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN] {
            self.remove(key);
        }
    }

    fn write(&self, key: &str, value: &str) {
        let Some(storage) = self.storage.as_deref() else {
            return;
        };
        if let Err(err) = storage.set_value(&self.namespace, key, value) {
            warn!(provider = %self.provider_key, key, error = %err, "secure storage write failed");
        }
    }

    fn remove(&self, key: &str) {
        let Some(storage) = self.storage.as_deref() else {
            return;
        };
        if let Err(err) = storage.remove_value(&self.namespace, key) {
            warn!(provider = %self.provider_key, key, error = %err, "secure storage removal failed");
        }
    }
}

/// Secure-storage namespace of a provider: `Flowery.OAuth.<providerKey>`.
pub fn namespace_for(provider_key: &str) -> String {
    format!("{SECURE_STORAGE_PREFIX}.{provider_key}")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
