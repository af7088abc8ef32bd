//! Capture flow handlers: the visitor page and its callback endpoints
//!
//! Every callback resolves the session first, so an unknown id is reported
//! as `Invalid session` whatever the body holds, and nothing is written.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use handoff_core::{
    CaptureEvent, LocationReport, RelayEvent, SessionError,
    capture::{ConsentPayload, PhotoPayload, SubmitPayload, parse_device_info},
};

use super::static_files::{render_capture_page, render_status_page};
use crate::{ApiError, AppState, CallbackResponse};

type CallbackResult = Result<Json<CallbackResponse>, ApiError>;

/// GET /capture/:id - Render the flow, or a page explaining why it is unavailable
pub async fn capture_page(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.store.get(&id).await {
        Ok(session) if session.withdrawn => (
            StatusCode::CONFLICT,
            Html(render_status_page(
                "Link closed",
                "This link was withdrawn and can no longer be used.",
            )),
        )
            .into_response(),
        Ok(session) if session.used => (
            StatusCode::CONFLICT,
            Html(render_status_page(
                "Already submitted",
                "This link has already been used.",
            )),
        )
            .into_response(),
        Ok(session) => Html(render_capture_page(session.id(), &state.capture)).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Html(render_status_page(
                "Link invalid or expired",
                "Ask the person who sent it for a new link.",
            )),
        )
            .into_response(),
    }
}

/// Apply `event` to the session and queue its relay
async fn apply_and_relay(state: &AppState, id: &str, event: CaptureEvent) -> CallbackResult {
    let policy = state.replay;
    let (session, ()) = state
        .store
        .update(id, |session| session.apply(&event, policy, Utc::now()))
        .await?;

    tracing::debug!(session_id = %id, kind = event.kind(), "Applied capture event");
    state.relay.enqueue(RelayEvent::new(session, event));
    Ok(Json(CallbackResponse::ok()))
}

/// Fail with `NotFound` before looking at the body
async fn ensure_session(state: &AppState, id: &str) -> Result<(), ApiError> {
    state.store.get(id).await?;
    Ok(())
}

/// POST /capture/:id/consent
pub async fn consent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ConsentPayload>, JsonRejection>,
) -> CallbackResult {
    ensure_session(&state, &id).await?;
    let Json(payload) = payload?;
    apply_and_relay(
        &state,
        &id,
        CaptureEvent::Consent {
            accepted: payload.accepted,
        },
    )
    .await
}

/// POST /capture/:id/photo
pub async fn photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<PhotoPayload>, JsonRejection>,
) -> CallbackResult {
    ensure_session(&state, &id).await?;
    let Json(payload) = payload?;
    let photo = payload.decode(state.capture.max_photo_bytes)?;
    apply_and_relay(&state, &id, CaptureEvent::Photo(photo)).await
}

/// POST /capture/:id/device-info
pub async fn device_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> CallbackResult {
    ensure_session(&state, &id).await?;
    let Json(payload) = payload?;
    let info = parse_device_info(payload)?;
    apply_and_relay(&state, &id, CaptureEvent::DeviceInfo(info)).await
}

/// POST /capture/:id/location
pub async fn location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<LocationReport>, JsonRejection>,
) -> CallbackResult {
    ensure_session(&state, &id).await?;
    let Json(report) = payload?;
    let report = report.validate()?;
    apply_and_relay(&state, &id, CaptureEvent::Location(report)).await
}

/// POST /capture/:id/submit
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<SubmitPayload>, JsonRejection>,
) -> CallbackResult {
    ensure_session(&state, &id).await?;
    let Json(payload) = payload?;
    let submission = payload.validate(&state.capture)?;
    apply_and_relay(&state, &id, CaptureEvent::Submit(submission)).await
}

/// POST /capture/:id/withdraw
pub async fn withdraw(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> CallbackResult {
    match apply_and_relay(&state, &id, CaptureEvent::Withdraw).await {
        Err(err) if err.status() == StatusCode::FORBIDDEN => {
            // Nothing was shared without consent, so there is nothing to withdraw
            Err(ApiError::from(SessionError::MalformedPayload(
                "Nothing to withdraw".to_string(),
            )))
        }
        result => result,
    }
}
