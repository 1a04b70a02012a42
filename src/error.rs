//! Registration error types with HTTP status code mapping.
//!
//! [`RegistrationError`] is the central error type of the service. The
//! engine returns it; the HTTP layer turns it into a status code and a
//! structured JSON body through [`IntoResponse`].

use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{AttendeeIdentity, EventId, InvalidAttendee, RegistrationId, WaitlistEntryId};
use crate::store::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "attendee ada@example.org already registered for event …"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RegistrationError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Engine and request error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status              |
/// |-----------|---------------------|--------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request          |
/// | 2000–2099 | Not Found           | 404 Not Found            |
/// | 2100–2199 | Conflict            | 409 Conflict             |
/// | 3000–3999 | Storage             | 503 Service Unavailable  |
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Request validation failed at the HTTP boundary.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Event with the given ID was not found.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Registration with the given ID was not found.
    #[error("registration not found: {0}")]
    RegistrationNotFound(RegistrationId),

    /// Waitlist entry with the given ID was not found.
    #[error("waitlist entry not found: {0}")]
    WaitlistEntryNotFound(WaitlistEntryId),

    /// The attendee already holds a confirmed registration or a waitlist
    /// entry for the event.
    #[error("attendee {attendee} already registered for event {event_id}")]
    DuplicateRegistration {
        /// Event the attendee tried to register for.
        event_id: EventId,
        /// The attendee.
        attendee: AttendeeIdentity,
    },

    /// The operation is not allowed in the record's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Persistence gateway failure. Not retried by the engine.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl RegistrationError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::EventNotFound(_) => 2001,
            Self::RegistrationNotFound(_) => 2002,
            Self::WaitlistEntryNotFound(_) => 2003,
            Self::DuplicateRegistration { .. } => 2101,
            Self::InvalidState(_) => 2102,
            Self::Storage(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::EventNotFound(_)
            | Self::RegistrationNotFound(_)
            | Self::WaitlistEntryNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateRegistration { .. } | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns `true` for the not-found family of variants.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound(_) | Self::RegistrationNotFound(_) | Self::WaitlistEntryNotFound(_)
        )
    }
}

impl From<InvalidAttendee> for RegistrationError {
    fn from(err: InvalidAttendee) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<JsonRejection> for RegistrationError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<FormRejection> for RegistrationError {
    fn from(rejection: FormRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for RegistrationError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for RegistrationError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            RegistrationError::EventNotFound(EventId::new()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RegistrationError::RegistrationNotFound(RegistrationId::new()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RegistrationError::InvalidState("already cancelled".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            RegistrationError::Storage(StoreError::Unavailable("down".to_string())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RegistrationError::InvalidRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn duplicate_is_conflict() {
        let Ok(attendee) = AttendeeIdentity::parse("ada@example.org") else {
            panic!("valid attendee");
        };
        let err = RegistrationError::DuplicateRegistration {
            event_id: EventId::new(),
            attendee,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), 2101);
        assert!(err.to_string().contains("ada@example.org"));
    }

    #[test]
    fn invalid_attendee_becomes_bad_request() {
        let err = RegistrationError::from(InvalidAttendee::Empty);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn response_carries_status() {
        let response = RegistrationError::WaitlistEntryNotFound(WaitlistEntryId::new()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
