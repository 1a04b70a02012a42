//! Event CRUD handlers: create, list, get, update, delete.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateEventRequest, EventListResponse, PaginationParams, UpdateEventRequest,
    UpdateEventResponse,
};
use crate::api::extract::JsonOrForm;
use crate::app_state::AppState;
use crate::domain::{Event, EventId};
use crate::error::{ErrorResponse, RegistrationError};
use crate::store::RegistrationStore;

/// `POST /api/events` : Create a new event.
///
/// # Errors
///
/// Returns [`RegistrationError::InvalidRequest`] on a malformed body.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates an event with the given title and capacity and no registrations.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn create_event<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    JsonOrForm(req): JsonOrForm<CreateEventRequest>,
) -> Result<impl IntoResponse, RegistrationError> {
    let (title, capacity) = req.validate()?;
    let event = state.engine.create_event(title, capacity).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// `GET /api/events` : List events with pagination.
///
/// # Errors
///
/// Returns [`RegistrationError`] on invalid query parameters or store
/// failure.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "Events",
    summary = "List events",
    description = "Returns a paginated list of events, oldest first.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated event list", body = EventListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
    )
)]
pub async fn list_events<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Query(params) = params?;
    let events = state.engine.list_events().await?;
    let (data, pagination) = params.paginate(events);
    Ok(Json(EventListResponse { data, pagination }))
}

/// `GET /api/events/{eventId}` : Get one event.
///
/// # Errors
///
/// Returns [`RegistrationError::EventNotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/events/{eventId}",
    tag = "Events",
    summary = "Get an event",
    description = "Returns a single event including its current confirmed count.",
    params(
        ("eventId" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event details", body = Event),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    event_id: Result<Path<EventId>, PathRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Path(event_id) = event_id?;
    Ok(Json(state.engine.get_event(event_id).await?))
}

/// `PATCH /api/events/{eventId}` : Change title and/or capacity.
///
/// # Errors
///
/// Returns [`RegistrationError::InvalidState`] if the capacity would drop
/// below the confirmed count.
#[utoipa::path(
    patch,
    path = "/api/events/{eventId}",
    tag = "Events",
    summary = "Update an event",
    description = "Updates the title and/or capacity. Raising the capacity promotes waitlisted attendees in position order.",
    params(
        ("eventId" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = UpdateEventResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Capacity below confirmed count", body = ErrorResponse),
    )
)]
pub async fn update_event<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    event_id: Result<Path<EventId>, PathRejection>,
    JsonOrForm(req): JsonOrForm<UpdateEventRequest>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Path(event_id) = event_id?;
    let update = state.engine.update_event(event_id, req.validate()?).await?;
    Ok(Json(UpdateEventResponse {
        event: update.event,
        promoted: update.promoted,
    }))
}

/// `DELETE /api/events/{eventId}` : Remove an event and everything under it.
///
/// # Errors
///
/// Returns [`RegistrationError::EventNotFound`] if the event does not exist.
#[utoipa::path(
    delete,
    path = "/api/events/{eventId}",
    tag = "Events",
    summary = "Delete an event",
    description = "Removes the event together with its registrations and waitlist.",
    params(
        ("eventId" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn delete_event<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    event_id: Result<Path<EventId>, PathRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let Path(event_id) = event_id?;
    state.engine.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Event management routes.
pub fn routes<S: RegistrationStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/events", post(create_event::<S>).get(list_events::<S>))
        .route(
            "/events/{event_id}",
            get(get_event::<S>)
                .patch(update_event::<S>)
                .delete(delete_event::<S>),
        )
}
