//! Operator API handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use handoff_core::{IssuedSession, relay::DeadLetter, relay::RelayStatsSnapshot};
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppState, CallbackResponse};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Number of sessions held in memory
    pub sessions: usize,
    /// Relay counters
    pub relay: RelayStatsSnapshot,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        sessions: state.store.len().await,
        relay: state.relay.stats(),
    })
}

/// Request body for POST /api/sessions
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueRequest {
    pub destination: String,
}

/// POST /api/sessions - Issue a session and return its access URL
pub async fn issue_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedSession>), ApiError> {
    let Json(request) = payload?;
    let issued = state.issuer.issue(&request.destination).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Request body for POST /register-session
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(alias = "session_id")]
    pub session_id: String,
    pub destination: String,
}

/// POST /register-session - Register a session minted by another process
pub async fn register_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<CallbackResponse>, ApiError> {
    let Json(request) = payload?;
    state
        .issuer
        .register(&request.session_id, &request.destination)
        .await?;
    Ok(Json(CallbackResponse::ok()))
}

/// Operator view of a session; withholds the submitted values
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub destination: String,
    /// When the session was issued (ISO 8601 format)
    pub created_at: String,
    pub consented: bool,
    pub used: bool,
    pub withdrawn: bool,
    pub has_location: bool,
    pub has_device_info: bool,
    pub photos_received: u32,
}

/// GET /api/sessions/:id - Inspect a session's progress
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let session = state.store.get(&id).await?;
    Ok(Json(SessionSummary {
        id: session.id().to_string(),
        destination: session.destination().to_string(),
        created_at: session.created_at.to_rfc3339(),
        consented: session.has_consent(),
        used: session.used,
        withdrawn: session.withdrawn,
        has_location: session.location.is_some(),
        has_device_info: session.device_info.is_some(),
        photos_received: session.photos_received,
    }))
}

/// Response for GET /api/dead-letters
#[derive(Debug, Serialize, Deserialize)]
pub struct DeadLetterListResponse {
    pub count: usize,
    pub dead_letters: Vec<DeadLetter>,
}

/// GET /api/dead-letters - Notifications that could not be delivered
pub async fn dead_letters(State(state): State<Arc<AppState>>) -> Json<DeadLetterListResponse> {
    let dead_letters = state.relay.dead_letters().recent().await;
    Json(DeadLetterListResponse {
        count: dead_letters.len(),
        dead_letters,
    })
}
