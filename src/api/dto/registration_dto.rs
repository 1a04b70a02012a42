//! Registration and waitlist DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    AttendeeIdentity, Cancellation, Registration, RegistrationOutcome, RegistrationStatus,
    WaitlistEntry,
};
use crate::error::RegistrationError;

/// Request body for `POST /api/events/{eventId}/registrations`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Attendee e-mail address. Normalized to lowercase.
    pub attendee_identity: String,
}

impl RegisterRequest {
    /// Validates the attendee identity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidRequest`] if it is not a
    /// plausible e-mail address.
    pub fn validate(self) -> Result<AttendeeIdentity, RegistrationError> {
        Ok(AttendeeIdentity::parse(&self.attendee_identity)?)
    }
}

/// Response body for a registration attempt.
///
/// `201 Created` carries `{"status":"confirmed","registration":…}`,
/// `202 Accepted` carries `{"status":"waitlisted","waitlistEntry":…}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RegisterResponse {
    /// A seat was free.
    Confirmed {
        /// The new confirmed registration.
        registration: Registration,
    },
    /// The event was full.
    Waitlisted {
        /// The new waitlist entry.
        #[serde(rename = "waitlistEntry")]
        waitlist_entry: WaitlistEntry,
    },
}

impl From<RegistrationOutcome> for RegisterResponse {
    fn from(outcome: RegistrationOutcome) -> Self {
        match outcome {
            RegistrationOutcome::Confirmed(registration) => Self::Confirmed { registration },
            RegistrationOutcome::Waitlisted(waitlist_entry) => Self::Waitlisted { waitlist_entry },
        }
    }
}

/// Response body for `DELETE /api/registrations/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    /// The registration, now cancelled.
    pub cancelled: Registration,
    /// The waitlisted attendee promoted into the freed seat, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted: Option<Registration>,
}

impl From<Cancellation> for CancelResponse {
    fn from(c: Cancellation) -> Self {
        Self {
            cancelled: c.cancelled,
            promoted: c.promoted,
        }
    }
}

/// Response body for `DELETE /api/waitlist/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawResponse {
    /// The removed waitlist entry.
    pub withdrawn: WaitlistEntry,
}

/// Query parameters for `GET /api/events/{eventId}/registrations`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegistrationListParams {
    /// Only return registrations in this state.
    #[serde(default)]
    #[param(value_type = Option<String>, example = "confirmed")]
    pub status: Option<RegistrationStatus>,
}
