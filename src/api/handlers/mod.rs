//! REST endpoint handlers organized by resource.

pub mod events;
pub mod registrations;
pub mod system;

use axum::Router;

use crate::app_state::AppState;
use crate::store::RegistrationStore;

/// Composes all resource routes under `/api`.
pub fn routes<S: RegistrationStore>() -> Router<AppState<S>> {
    Router::new()
        .merge(events::routes::<S>())
        .merge(registrations::routes::<S>())
}
