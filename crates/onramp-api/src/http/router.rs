//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS (allow-all, webhooks come from external services),
//! request tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Employees
        .route(
            "/employees",
            post(handlers::employee::create_employee).get(handlers::employee::list_employees),
        )
        .route("/employees/{id}", get(handlers::employee::get_employee))
        // Onboarding workflow
        .route(
            "/onboarding/start",
            post(handlers::onboarding::start_onboarding),
        )
        .route(
            "/onboarding/status/{token}",
            get(handlers::onboarding::get_onboarding_status),
        )
        // External service callbacks
        .route(
            "/webhooks/document-status",
            post(handlers::webhook::document_status),
        )
        .route(
            "/webhooks/quiz-status",
            post(handlers::webhook::quiz_status),
        )
        // Dashboard stats
        .route("/stats", get(handlers::stats::get_stats));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
