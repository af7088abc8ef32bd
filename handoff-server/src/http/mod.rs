//! HTTP server module

mod api;
mod capture;
mod static_files;

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::{AppState, AuthLayer, operator_auth};

pub use api::{
    DeadLetterListResponse, HealthResponse, IssueRequest, RegisterRequest, SessionSummary,
};
pub use static_files::{render_capture_page, render_status_page};

/// Headroom for base64 and JSON framing around a photo
const PHOTO_BODY_OVERHEAD: usize = 64 * 1024;

/// Visitor-facing routes: the page, its assets and the callbacks
pub fn capture_routes(state: Arc<AppState>) -> Router {
    let photo_limit = state.capture.max_photo_bytes / 3 * 4 + PHOTO_BODY_OVERHEAD;

    Router::new()
        .route("/", get(|| async { "handoff is running" }))
        .route("/assets/*path", get(static_files::asset_handler))
        .route("/capture/:id", get(capture::capture_page))
        .route("/capture/:id/consent", post(capture::consent))
        .route(
            "/capture/:id/photo",
            post(capture::photo).layer(DefaultBodyLimit::max(photo_limit)),
        )
        .route("/capture/:id/device-info", post(capture::device_info))
        .route("/capture/:id/location", post(capture::location))
        .route("/capture/:id/submit", post(capture::submit))
        .route("/capture/:id/withdraw", post(capture::withdraw))
        .with_state(state)
}

/// Collaborator-facing routes, guarded by the operator token
pub fn operator_routes(state: Arc<AppState>, auth: AuthLayer) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/sessions", post(api::issue_session))
        .route("/api/sessions/:id", get(api::get_session))
        .route("/api/dead-letters", get(api::dead_letters))
        .route("/register-session", post(api::register_session))
        .layer(middleware::from_fn(operator_auth))
        .layer(Extension(auth))
        .with_state(state)
}

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>, auth: AuthLayer) -> Router {
    Router::new()
        .merge(capture_routes(Arc::clone(&state)))
        .merge(operator_routes(state, auth))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}
