//! User identities for the presence directory.
//!
//! An identity is an email-shaped string token. Matching is
//! case-insensitive and whitespace-insensitive: every identity is
//! trimmed and lower-cased before it touches the directory, so
//! `"A@B.com"`, `"a@b.com "` and `"a@b.com"` all name the same entry.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Identity errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The identity was empty or missing after normalization.
    #[error("Empty or missing identity")]
    Empty,
}

/// A normalized user identity, the key of the presence directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Parse and normalize an identity from a raw string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Empty`] if the string is empty after
    /// trimming.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(Self(normalized))
    }

    /// Extract an identity from a `go-online` payload.
    ///
    /// Clients send either `{ "email": "..." }` or a bare string; both
    /// forms are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Empty`] if neither form yields a
    /// non-empty identity.
    pub fn from_payload(payload: &Value) -> Result<Self, IdentityError> {
        match payload {
            Value::String(s) => Self::parse(s),
            Value::Object(map) => match map.get("email").and_then(Value::as_str) {
                Some(s) => Self::parse(s),
                None => Err(IdentityError::Empty),
            },
            _ => Err(IdentityError::Empty),
        }
    }

    /// Get the normalized identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalization() {
        let a = Identity::parse("A@B.com").unwrap();
        let b = Identity::parse("a@b.com ").unwrap();
        let c = Identity::parse("a@b.com").unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "a@b.com");
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(Identity::parse(""), Err(IdentityError::Empty));
        assert_eq!(Identity::parse("   "), Err(IdentityError::Empty));
    }

    #[test]
    fn test_from_payload_forms() {
        let from_object = Identity::from_payload(&json!({ "email": "User@X.com" })).unwrap();
        let from_string = Identity::from_payload(&json!("user@x.com")).unwrap();
        assert_eq!(from_object, from_string);

        assert!(Identity::from_payload(&json!({})).is_err());
        assert!(Identity::from_payload(&json!({ "email": "  " })).is_err());
        assert!(Identity::from_payload(&json!(42)).is_err());
    }
}
