//! Operator authentication middleware for axum
//!
//! Capture routes are never behind this layer: the session id in their path
//! is the visitor's only credential.

use std::net::SocketAddr;

use axum::{
    Extension,
    extract::{ConnectInfo, Request},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};

/// Authentication layer state
#[derive(Clone, Debug)]
pub struct AuthLayer {
    token: Option<String>,
    bypass_localhost: bool,
}

impl AuthLayer {
    /// Require `token` on operator routes; `None` leaves them open
    pub fn new(token: Option<String>, bypass_localhost: bool) -> Self {
        let token = token.filter(|t| !t.is_empty());
        Self {
            token,
            bypass_localhost,
        }
    }

    /// Create a disabled AuthLayer (for testing or when no token is configured)
    pub fn disabled() -> Self {
        Self {
            token: None,
            bypass_localhost: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }
}

/// Check if the request is from localhost
fn is_localhost(addr: &SocketAddr) -> bool {
    addr.ip().is_loopback()
}

/// Extract a bearer token from the Authorization header
fn extract_bearer(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte
fn tokens_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .iter()
        .zip(provided)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Authentication middleware function
pub async fn operator_auth(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Extension(auth_layer): Extension<AuthLayer>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = auth_layer.token.as_deref() else {
        return Ok(next.run(request).await);
    };

    if auth_layer.bypass_localhost
        && connect_info.is_some_and(|ConnectInfo(addr)| is_localhost(&addr))
    {
        return Ok(next.run(request).await);
    }

    let authorized = extract_bearer(&request).map(|provided| tokens_match(expected, provided));
    match authorized {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            tracing::debug!("Operator token mismatch");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::debug!("No operator token provided");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
