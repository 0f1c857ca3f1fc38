pub mod auth;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use auth::{Claims, TokenVerifier, jwt_auth_middleware, require_admin};
pub use state::{AppState, Stores};

/// Build the complete application router
pub fn router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Public Routes (no auth required)
    // ==========================================================================
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/programs", get(handlers::list_programs))
        .route("/programs/{id}", get(handlers::get_program))
        .route("/enrollments", post(handlers::submit_enrollment))
        .route("/payments/config", get(handlers::payment_config))
        // Authenticated by provider signature
        .route("/payments/webhook/{provider}", post(handlers::payment_webhook));

    // ==========================================================================
    // Learner Routes - Protected by JWT
    // ==========================================================================
    let learner_routes = Router::new()
        .route("/enrollments/me", get(handlers::my_enrollments))
        .route("/payments/initialize", post(handlers::initialize_payment))
        .route(
            "/payments/verify/paystack/{reference}",
            get(handlers::verify_paystack),
        )
        .route("/payments/verify/stripe", post(handlers::verify_stripe))
        .route("/lessons/program/{program_id}", get(handlers::program_lessons))
        .route("/lessons/{id}", get(handlers::get_lesson))
        .route("/lessons/{id}/complete", post(handlers::complete_lesson))
        .route("/student/dashboard", get(handlers::dashboard))
        .route("/student/program/{program_id}", get(handlers::learning_page))
        .route("/student/notes", post(handlers::save_note))
        .route("/student/notes/{program_id}", get(handlers::list_notes))
        .route("/student/quiz/{lesson_id}/submit", post(handlers::submit_quiz))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // ==========================================================================
    // Admin Routes - JWT + admin role
    // ==========================================================================
    let admin_routes = Router::new()
        .route("/enrollments", get(handlers::list_enrollments))
        .route(
            "/enrollments/{id}",
            get(handlers::get_enrollment).delete(handlers::delete_enrollment),
        )
        .route("/enrollments/{id}/status", put(handlers::update_enrollment_status))
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .nest(
            "/api/v1",
            public_routes.merge(learner_routes).merge(admin_routes),
        )
        .with_state(state)
        // OpenAPI / Swagger UI (stateless, added after with_state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Bind `host:port` and serve until the process is stopped
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {}: {} (port {} may already be in use)",
            addr,
            e,
            port
        )
    })?;

    tracing::info!("🚀 Gateway listening on http://{}", addr);
    tracing::info!("📖 API Docs: http://{}/docs", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
