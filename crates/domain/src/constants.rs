//! Application constants
//!
//! Centralized location for the secure-storage layout and OIDC protocol
//! defaults shared by every identity provider connection.

// Secure storage namespace: "<prefix>.<providerKey>"
pub const SECURE_STORAGE_PREFIX: &str = "Flowery.OAuth";

// Secure storage keys
pub const KEY_HAS_TOKEN: &str = "HasToken";
pub const KEY_ACCESS_TOKEN: &str = "AccessToken";
pub const KEY_REFRESH_TOKEN: &str = "RefreshToken";
pub const KEY_USER_RAW_ID: &str = "UserRawId";
pub const KEY_USER_DISPLAY_NAME: &str = "UserDisplayName";
pub const KEY_USER_EMAIL: &str = "UserEmail";
pub const KEY_USER_AVATAR_URL: &str = "UserAvatarUrl";

/// Value written under [`KEY_HAS_TOKEN`] while a session is persisted.
pub const HAS_TOKEN_SENTINEL: &str = "1";

/// Snapshot keys removed when the persisted profile is cleared.
pub const PROFILE_SNAPSHOT_KEYS: [&str; 4] =
    [KEY_USER_RAW_ID, KEY_USER_DISPLAY_NAME, KEY_USER_EMAIL, KEY_USER_AVATAR_URL];

// Composite user ids
pub const USER_ID_DELIMITER: char = ':';

// OIDC defaults
pub const DEFAULT_SCOPE: &str = "openid profile email";
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const DEFAULT_LOOPBACK_PORT: u16 = 7890;
pub const DEFAULT_BROWSER_TIMEOUT_SECS: u64 = 300;
pub const LOOPBACK_DRAIN_WINDOW_MS: u64 = 1000;
pub const PROVIDER_IMPLEMENTATION_VERSION: &str = "1.0.0";

// HTTP defaults
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_MAX_ATTEMPTS: usize = 1;
