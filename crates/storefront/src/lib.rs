//! Marvo Store storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused. [`build_app`] assembles the full
//! router; the `marvo-storefront` binary and the integration tests both
//! serve it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::{Router, routing::get};
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::ImageError;
use crate::state::AppState;

/// Largest request body accepted (product image uploads): 16 MiB.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Failures while assembling the application.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("session store: {0}")]
    SessionStore(#[from] sqlx::Error),
    #[error("upload directory: {0}")]
    UploadDir(#[from] ImageError),
}

/// Build the complete storefront router.
///
/// Creates the session table and the upload directory if missing.
///
/// # Errors
///
/// Returns `BuildError` if either cannot be created.
pub async fn build_app(state: AppState) -> Result<Router, BuildError> {
    let store = middleware::create_session_store(state.pool()).await?;
    state.images().ensure_root().await?;

    let session_layer = middleware::create_session_layer(store, state.config());
    let uploads = ServeDir::new(state.images().root());
    let statics = ServeDir::new(&state.config().static_dir);

    let router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", statics)
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security_headers_middleware,
        ))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    Ok(router)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
