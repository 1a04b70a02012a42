//! Validated attendee identity.
//!
//! Attendees are identified by e-mail address. The HTTP layer parses raw
//! request strings into an [`AttendeeIdentity`] before anything reaches the
//! registration engine, so the engine never sees unvalidated input.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Longest accepted address, per RFC 5321 path limits.
const MAX_LEN: usize = 254;

/// Normalized attendee e-mail address (trimmed, lower-cased).
///
/// Two requests for `" Ada@Example.org"` and `"ada@example.org"` resolve to
/// the same attendee, which is what the one-active-entry-per-event rule keys
/// on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct AttendeeIdentity(String);

/// Reason an attendee identity was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAttendee {
    /// Input was empty after trimming.
    #[error("attendee identity must not be empty")]
    Empty,
    /// Input exceeds the maximum address length.
    #[error("attendee identity exceeds 254 characters")]
    TooLong,
    /// Input is not shaped like an e-mail address.
    #[error("attendee identity must be an e-mail address: {0}")]
    Malformed(String),
}

impl AttendeeIdentity {
    /// Parses and normalizes a raw attendee identity.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidAttendee`] if the input is empty, too long, or not
    /// an e-mail address.
    pub fn parse(raw: &str) -> Result<Self, InvalidAttendee> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(InvalidAttendee::Empty);
        }
        if normalized.chars().count() > MAX_LEN {
            return Err(InvalidAttendee::TooLong);
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(InvalidAttendee::Malformed(normalized));
        }

        let mut parts = normalized.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(InvalidAttendee::Malformed(normalized));
        };
        let domain_ok =
            domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.');
        if local.is_empty() || !domain_ok {
            return Err(InvalidAttendee::Malformed(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttendeeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AttendeeIdentity {
    type Error = InvalidAttendee;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AttendeeIdentity> for String {
    fn from(id: AttendeeIdentity) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let id = AttendeeIdentity::parse("  Ada.Lovelace@Example.ORG ");
        assert_eq!(
            id.map(|i| i.to_string()),
            Ok("ada.lovelace@example.org".to_string())
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(AttendeeIdentity::parse("   "), Err(InvalidAttendee::Empty));
    }

    #[test]
    fn rejects_missing_or_repeated_at() {
        assert!(AttendeeIdentity::parse("ada.example.org").is_err());
        assert!(AttendeeIdentity::parse("ada@@example.org").is_err());
        assert!(AttendeeIdentity::parse("a@b@example.org").is_err());
    }

    #[test]
    fn rejects_bad_domain() {
        assert!(AttendeeIdentity::parse("ada@localhost").is_err());
        assert!(AttendeeIdentity::parse("ada@.example").is_err());
        assert!(AttendeeIdentity::parse("ada@example.").is_err());
        assert!(AttendeeIdentity::parse("@example.org").is_err());
    }

    #[test]
    fn rejects_inner_whitespace() {
        assert!(AttendeeIdentity::parse("ada love@example.org").is_err());
    }

    #[test]
    fn rejects_overlong() {
        let raw = format!("{}@example.org", "a".repeat(MAX_LEN));
        assert_eq!(AttendeeIdentity::parse(&raw), Err(InvalidAttendee::TooLong));
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<AttendeeIdentity, _> = serde_json::from_str("\"BOB@example.com\"");
        assert_eq!(ok.ok().map(|i| i.to_string()), Some("bob@example.com".to_string()));

        let bad: Result<AttendeeIdentity, _> = serde_json::from_str("\"not-an-email\"");
        assert!(bad.is_err());
    }
}
