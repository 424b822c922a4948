//! Composite user identifiers
//!
//! A composite id disambiguates a provider-local user id across identity
//! providers: `<providerKey>:<rawId>`.

use crate::constants::USER_ID_DELIMITER;

/// Build `<provider_key>:<raw_id>`.
///
/// An empty provider key yields the raw id unchanged.
///
/// # Examples
/// ```
/// use flowery_domain::user_id::compose;
///
/// assert_eq!(compose("github", "12345"), "github:12345");
/// assert_eq!(compose("", "12345"), "12345");
/// ```
#[must_use]
pub fn compose(provider_key: &str, raw_id: &str) -> String {
    if provider_key.is_empty() {
        return raw_id.to_string();
    }
    format!("{provider_key}{USER_ID_DELIMITER}{raw_id}")
}

/// Split a composite id into `(provider_key, raw_id)`.
///
/// Splits on the first delimiter found after position 0. An id without a
/// delimiter, or one that starts with it, has no provider prefix and is
/// returned whole as the raw id.
///
/// # Examples
/// ```
/// use flowery_domain::user_id::parse;
///
/// assert_eq!(parse("github:12345"), (Some("github"), "12345"));
/// assert_eq!(parse("noColon"), (None, "noColon"));
/// assert_eq!(parse(":12345"), (None, ":12345"));
/// ```
#[must_use]
pub fn parse(id: &str) -> (Option<&str>, &str) {
    match id.find(USER_ID_DELIMITER) {
        Some(index) if index > 0 => (Some(&id[..index]), &id[index + 1..]),
        _ => (None, id),
    }
}

/// Provider key prefix of `id`, if present.
#[must_use]
pub fn provider_key_of(id: &str) -> Option<&str> {
    parse(id).0
}
