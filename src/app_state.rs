//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::RegistrationEngine;
use crate::store::RegistrationStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug)]
pub struct AppState<S> {
    /// Registration engine for all business logic.
    pub engine: Arc<RegistrationEngine<S>>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl<S: RegistrationStore> AppState<S> {
    /// Wraps a store in a new engine sharing one event bus.
    #[must_use]
    pub fn new(store: S, event_bus: EventBus) -> Self {
        Self {
            engine: Arc::new(RegistrationEngine::new(store, event_bus.clone())),
            event_bus,
        }
    }
}

// Derived Clone would require `S: Clone` on the struct itself.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            event_bus: self.event_bus.clone(),
        }
    }
}
