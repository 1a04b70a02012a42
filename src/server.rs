//! Router composition and the HTTP server loop.

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::ServiceConfig;
use crate::store::RegistrationStore;
use crate::ws::handler::ws_handler;

/// File served for `/events/{eventId}/register`.
pub const REGISTER_PAGE: &str = "register.html";

/// Builds the full application: REST API, WebSocket feed, registration page,
/// static files and (with the `swagger-ui` feature) the API explorer.
pub fn build_app<S: RegistrationStore>(state: AppState<S>, config: &ServiceConfig) -> Router {
    let register_page = ServeFile::new(config.static_dir.join(REGISTER_PAGE));

    let router = api::build_router::<S>()
        .route("/ws", get(ws_handler::<S>))
        .route_service("/events/{event_id}/register", register_page)
        .fallback_service(ServeDir::new(&config.static_dir));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()),
        )
    };

    router
        .layer(request_timeout(config.request_timeout_secs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Fails requests that take longer than `secs` with `408 Request Timeout`.
#[must_use]
pub fn request_timeout(secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
}

/// Serves `app` on `listener` until Ctrl-C or SIGTERM, then drains in-flight
/// requests.
///
/// # Errors
///
/// Returns the I/O error that stopped the accept loop.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::Service;

    use super::*;

    #[tokio::test]
    async fn slow_requests_time_out_with_408() {
        let mut app: Router = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    "late"
                }),
            )
            .route("/fast", get(|| async { "ok" }))
            .layer(request_timeout(1));

        let Ok(request) = Request::builder().uri("/slow").body(Body::empty()) else {
            panic!("valid request");
        };
        let Ok(response) = app.call(request).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let Ok(request) = Request::builder().uri("/fast").body(Body::empty()) else {
            panic!("valid request");
        };
        let Ok(response) = app.call(request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
