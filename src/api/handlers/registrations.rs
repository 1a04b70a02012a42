//! Registration, cancellation and waitlist handlers.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CancelResponse, RegisterRequest, RegisterResponse, RegistrationListParams, WithdrawResponse,
};
use crate::api::extract::JsonOrForm;
use crate::app_state::AppState;
use crate::domain::{
    EventId, Registration, RegistrationId, RegistrationOutcome, WaitlistEntry, WaitlistEntryId,
};
use crate::error::{ErrorResponse, RegistrationError};
use crate::store::RegistrationStore;

/// `POST /api/events/{eventId}/registrations` : Register an attendee.
///
/// # Errors
///
/// - [`RegistrationError::InvalidRequest`] for a malformed attendee.
/// - [`RegistrationError::EventNotFound`] if the event does not exist.
/// - [`RegistrationError::DuplicateRegistration`] if the attendee is already
///   confirmed or waitlisted.
#[utoipa::path(
    post,
    path = "/api/events/{eventId}/registrations",
    tag = "Registrations",
    summary = "Register for an event",
    description = "Confirms the attendee if a seat is free, otherwise appends them to the waitlist.",
    params(
        ("eventId" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration confirmed", body = RegisterResponse),
        (status = 202, description = "Event full, attendee waitlisted", body = RegisterResponse),
        (status = 400, description = "Invalid attendee", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Already registered", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn register<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    event_id: Result<Path<EventId>, PathRejection>,
    JsonOrForm(req): JsonOrForm<RegisterRequest>,
) -> Result<Response, RegistrationError> {
    let Path(event_id) = event_id?;
    let attendee = req.validate()?;

    let outcome = state.engine.register(event_id, attendee).await?;
    let status = match outcome {
        RegistrationOutcome::Confirmed(_) => StatusCode::CREATED,
        RegistrationOutcome::Waitlisted(_) => StatusCode::ACCEPTED,
    };
    Ok((status, Json(RegisterResponse::from(outcome))).into_response())
}

/// `GET /api/events/{eventId}/registrations` : List an event's registrations.
///
/// # Errors
///
/// Returns [`RegistrationError::EventNotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/events/{eventId}/registrations",
    tag = "Registrations",
    summary = "List registrations",
    description = "Returns the event's registrations, oldest first, optionally filtered by status.",
    params(
        ("eventId" = uuid::Uuid, Path, description = "Event UUID"),
        RegistrationListParams,
    ),
    responses(
        (status = 200, description = "Registrations", body = Vec<Registration>),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_registrations<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    event_id: Result<Path<EventId>, PathRejection>,
    params: Result<Query<RegistrationListParams>, QueryRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Path(event_id) = event_id?;
    let Query(params) = params?;
    let registrations = state
        .engine
        .list_registrations(event_id, params.status)
        .await?;
    Ok(Json(registrations))
}

/// `GET /api/events/{eventId}/waitlist` : List an event's waitlist.
///
/// # Errors
///
/// Returns [`RegistrationError::EventNotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/events/{eventId}/waitlist",
    tag = "Registrations",
    summary = "List the waitlist",
    description = "Returns the event's waitlist in promotion order.",
    params(
        ("eventId" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Waitlist entries", body = Vec<WaitlistEntry>),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_waitlist<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    event_id: Result<Path<EventId>, PathRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Path(event_id) = event_id?;
    Ok(Json(state.engine.list_waitlist(event_id).await?))
}

/// `GET /api/registrations/{id}` : Get one registration.
///
/// # Errors
///
/// Returns [`RegistrationError::RegistrationNotFound`] if it does not exist.
#[utoipa::path(
    get,
    path = "/api/registrations/{id}",
    tag = "Registrations",
    summary = "Get a registration",
    params(
        ("id" = uuid::Uuid, Path, description = "Registration UUID"),
    ),
    responses(
        (status = 200, description = "Registration", body = Registration),
        (status = 404, description = "Registration not found", body = ErrorResponse),
    )
)]
pub async fn get_registration<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<RegistrationId>, PathRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Path(id) = id?;
    Ok(Json(state.engine.get_registration(id).await?))
}

/// `DELETE /api/registrations/{id}` : Cancel a registration.
///
/// # Errors
///
/// - [`RegistrationError::RegistrationNotFound`] if it does not exist.
/// - [`RegistrationError::InvalidState`] if it is already cancelled.
#[utoipa::path(
    delete,
    path = "/api/registrations/{id}",
    tag = "Registrations",
    summary = "Cancel a registration",
    description = "Cancels the registration and promotes the head of the waitlist into the freed seat, atomically.",
    params(
        ("id" = uuid::Uuid, Path, description = "Registration UUID"),
    ),
    responses(
        (status = 200, description = "Registration cancelled", body = CancelResponse),
        (status = 404, description = "Registration not found", body = ErrorResponse),
        (status = 409, description = "Already cancelled", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn cancel_registration<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<RegistrationId>, PathRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Path(id) = id?;
    let cancellation = state.engine.cancel(id).await?;
    Ok(Json(CancelResponse::from(cancellation)))
}

/// `DELETE /api/waitlist/{id}` : Leave a waitlist.
///
/// # Errors
///
/// Returns [`RegistrationError::WaitlistEntryNotFound`] if the entry does
/// not exist.
#[utoipa::path(
    delete,
    path = "/api/waitlist/{id}",
    tag = "Registrations",
    summary = "Withdraw from a waitlist",
    params(
        ("id" = uuid::Uuid, Path, description = "Waitlist entry UUID"),
    ),
    responses(
        (status = 200, description = "Entry withdrawn", body = WithdrawResponse),
        (status = 404, description = "Waitlist entry not found", body = ErrorResponse),
    )
)]
pub async fn withdraw<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<WaitlistEntryId>, PathRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Path(id) = id?;
    let withdrawn = state.engine.withdraw(id).await?;
    Ok(Json(WithdrawResponse { withdrawn }))
}

/// Registration and waitlist routes.
pub fn routes<S: RegistrationStore>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/events/{event_id}/registrations",
            post(register::<S>).get(list_registrations::<S>),
        )
        .route("/events/{event_id}/waitlist", get(list_waitlist::<S>))
        .route(
            "/registrations/{id}",
            get(get_registration::<S>).delete(cancel_registration::<S>),
        )
        .route("/waitlist/{id}", delete(withdraw::<S>))
}
