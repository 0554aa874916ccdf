//! HTTP router assembly.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers, state::AppState};

/// Build the application router.
///
/// # Routes
///
/// - `GET /health` - liveness probe
/// - `POST /api/v1/tickets/import` - CSV bulk upsert (multipart field `file`)
/// - `GET /api/v1/tickets/{code}` - ticket lookup
/// - `GET /api/v1/validate/{code}` - scan and redeem a ticket
/// - `GET /api/v1/statistics` - usage counters and recent scans
///
/// Scanner devices call in from arbitrary origins, so CORS is permissive.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/tickets/import",
            post(handlers::tickets::import_tickets),
        )
        .route("/api/v1/tickets/{code}", get(handlers::tickets::get_ticket))
        .route(
            "/api/v1/validate/{code}",
            get(handlers::validation::validate_ticket),
        )
        .route(
            "/api/v1/statistics",
            get(handlers::statistics::get_statistics),
        )
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        // Share store handles with all handlers via State extraction
        .with_state(state)
}
