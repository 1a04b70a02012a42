//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Resource endpoints are mounted under `/api`; `/health` sits at the root.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;
use crate::store::RegistrationStore;

/// Builds the complete API router with all REST endpoints.
pub fn build_router<S: RegistrationStore>() -> Router<AppState<S>> {
    Router::new()
        .nest("/api", handlers::routes::<S>())
        .merge(handlers::system::routes::<S>())
}
