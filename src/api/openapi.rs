//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{
    CancelResponse, CreateEventRequest, EventListResponse, PaginationMeta, RegisterRequest,
    RegisterResponse, UpdateEventRequest, UpdateEventResponse, WithdrawResponse,
};
use crate::api::handlers::{events, registrations, system};
use crate::domain::{Event, Registration, RegistrationStatus, WaitlistEntry};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI specification, served by Swagger UI when the
/// `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Event Registration API",
        description = "Capacity-bounded event registration with an ordered waitlist and automatic promotion."
    ),
    paths(
        events::create_event,
        events::list_events,
        events::get_event,
        events::update_event,
        events::delete_event,
        registrations::register,
        registrations::list_registrations,
        registrations::list_waitlist,
        registrations::get_registration,
        registrations::cancel_registration,
        registrations::withdraw,
        system::health_handler,
    ),
    components(schemas(
        Event,
        Registration,
        RegistrationStatus,
        WaitlistEntry,
        CreateEventRequest,
        UpdateEventRequest,
        UpdateEventResponse,
        EventListResponse,
        PaginationMeta,
        RegisterRequest,
        RegisterResponse,
        CancelResponse,
        WithdrawResponse,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
    )),
    tags(
        (name = "Events", description = "Event lifecycle"),
        (name = "Registrations", description = "Registration, cancellation and waitlist"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/api/events",
            "/api/events/{eventId}",
            "/api/events/{eventId}/registrations",
            "/api/events/{eventId}/waitlist",
            "/api/registrations/{id}",
            "/api/waitlist/{id}",
            "/health",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
