//! Capture sessions: identity, accumulated state and the shared store

mod config;
mod state;
mod store;

pub use config::SessionConfig;
pub use state::{Destination, ReplayPolicy, Session, SessionId};
pub use store::SessionStore;
