//! User claims from ID tokens and user-info responses
//!
//! Claims are kept as the raw JSON object; lookups treat blank strings as
//! absent so callers can walk fallback chains with [`Claims::first_of`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use super::client::OidcClientError;

/// JSON object of identity claims
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; `None` unless it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Decode the payload segment of a compact JWT.
    ///
    /// The signature is not verified here; the token came straight from the
    /// token endpoint over TLS.
    ///
    /// # Errors
    /// Returns `OidcClientError::InvalidIdToken` when the token is not a
    /// three-part JWT or its payload is not a base64url JSON object.
    pub fn from_id_token(id_token: &str) -> Result<Self, OidcClientError> {
        let parts: Vec<&str> = id_token.split('.').collect();
        if parts.len() != 3 {
            return Err(OidcClientError::InvalidIdToken("expected three segments".into()));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| OidcClientError::InvalidIdToken(format!("payload encoding: {e}")))?;
        let value: Value = serde_json::from_slice(&payload)
            .map_err(|e| OidcClientError::InvalidIdToken(format!("payload json: {e}")))?;

        Self::from_value(value)
            .ok_or_else(|| OidcClientError::InvalidIdToken("payload is not an object".into()))
    }

    /// Insert or replace a string claim.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), Value::String(value.into()));
    }

    /// Non-blank string value of `name`. Claims of any other JSON type read
    /// as absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// First non-blank value among `names`, in order.
    #[must_use]
    pub fn first_of(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.get(name))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Claim names present in this set
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Claims {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut claims = Self::new();
        for (k, v) in iter {
            claims.insert(k, v);
        }
        claims
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::claims.
    use super::*;

    fn jwt(payload: &str) -> String {
        format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    /// Validates `Claims::from_id_token` behavior for the well-formed token
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms string claims are readable.
    /// - Ensures blank and non-string claims read as absent.
    #[test]
    fn test_decode_id_token_payload() {
        let claims =
            Claims::from_id_token(&jwt(r#"{"sub":"u1","name":" ","uid":42,"nonce":"n"}"#))
                .unwrap();

        assert_eq!(claims.get("sub").as_deref(), Some("u1"));
        assert_eq!(claims.get("uid"), None);
        assert_eq!(claims.get("name"), None);
        assert_eq!(claims.first_of(&["name", "sub"]).as_deref(), Some("u1"));
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(Claims::from_id_token("not-a-jwt").is_err());
        assert!(Claims::from_id_token("a.!!!.c").is_err());
        assert!(Claims::from_id_token(&jwt("[1,2]")).is_err());
    }

    #[test]
    fn test_collect_from_pairs() {
        let claims: Claims = [("sub", "u1"), ("name", "Ada")].into_iter().collect();
        assert_eq!(claims.first_of(&["name"]).as_deref(), Some("Ada"));
        assert!(!claims.is_empty());
    }
}
