//! Middleware for the handoff server

mod auth;

pub use auth::{AuthLayer, operator_auth};
