//! Error types for handoff-core

use thiserror::Error;

/// Errors raised by the session store, issuer and callback validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid session id: {0}")]
    InvalidId(String),

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Consent required for session {0}")]
    ConsentRequired(String),

    #[error("Session already used: {0}")]
    AlreadyUsed(String),

    #[error("Session withdrawn: {0}")]
    Withdrawn(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// Errors raised while delivering a notification to a destination
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Destination rejected notification with status {status}")]
    Rejected { status: u16 },

    #[error("Relay queue closed")]
    Closed,
}
