//! Event DTOs for create, update, get, and list operations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{Event, Registration};
use crate::error::RegistrationError;
use crate::service::EventChanges;

/// Longest accepted event title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Request body for `POST /api/events`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    /// Event title (1–200 characters after trimming).
    pub title: String,
    /// Maximum number of confirmed registrations.
    pub capacity: u32,
}

impl CreateEventRequest {
    /// Validates the body into a trimmed title and a capacity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidRequest`] if the title is empty or
    /// too long.
    pub fn validate(self) -> Result<(String, u32), RegistrationError> {
        Ok((validate_title(&self.title)?, self.capacity))
    }
}

/// Request body for `PATCH /api/events/{eventId}`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New capacity; may not drop below the confirmed count.
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl UpdateEventRequest {
    /// Validates the body into engine-level [`EventChanges`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidRequest`] if no field is set or
    /// the title is invalid.
    pub fn validate(self) -> Result<EventChanges, RegistrationError> {
        if self.title.is_none() && self.capacity.is_none() {
            return Err(RegistrationError::InvalidRequest(
                "expected at least one of title, capacity".to_string(),
            ));
        }
        let title = self.title.as_deref().map(validate_title).transpose()?;
        Ok(EventChanges {
            title,
            capacity: self.capacity,
        })
    }
}

/// Response body for `PATCH /api/events/{eventId}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventResponse {
    /// The event after the update.
    pub event: Event,
    /// Registrations promoted from the waitlist by a capacity increase.
    pub promoted: Vec<Registration>,
}

/// Paginated list response for `GET /api/events`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    /// Events on this page, oldest first.
    pub data: Vec<Event>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

fn validate_title(raw: &str) -> Result<String, RegistrationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(RegistrationError::InvalidRequest(
            "title must not be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(RegistrationError::InvalidRequest(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}
