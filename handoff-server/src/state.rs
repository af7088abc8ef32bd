//! Shared application state for the handoff server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use handoff_core::{
    CaptureOptions, DeliverySink, RelayConfig, RelayForwarder, RelayHandle, ReplayPolicy,
    SessionConfig, SessionIssuer, SessionStore,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::AppConfig;

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Every live capture session
    pub store: Arc<SessionStore>,
    /// Mints sessions and access URLs
    pub issuer: Arc<SessionIssuer>,
    /// Producer side of the relay queue
    pub relay: RelayHandle,
    /// Options rendered into the capture page and used for validation
    pub capture: Arc<CaptureOptions>,
    /// Whether a used session accepts another submission
    pub replay: ReplayPolicy,
    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state from configuration and start the relay forwarder
    ///
    /// The returned task finishes after every clone of the state is dropped
    /// and the relay queue has drained.
    pub fn new(config: &AppConfig, sink: Arc<dyn DeliverySink>) -> (Self, JoinHandle<()>) {
        let store = Arc::new(match config.session.ttl() {
            Some(ttl) => SessionStore::with_ttl(ttl),
            None => SessionStore::new(),
        });
        let issuer = Arc::new(SessionIssuer::new(
            Arc::clone(&store),
            config.server.public_url(),
        ));
        let (relay, relay_task) = RelayForwarder::spawn(sink, config.relay.clone());

        let state = Self {
            store,
            issuer,
            relay,
            capture: Arc::new(config.capture.clone()),
            replay: config.session.replay,
            shutdown: CancellationToken::new(),
            started_at: Utc::now(),
        };
        (state, relay_task)
    }

    /// State with default configuration and the given sink (for testing)
    pub fn with_sink(sink: Arc<dyn DeliverySink>) -> Self {
        Self::with_session_config(SessionConfig::default(), sink)
    }

    /// State with a custom session config and sink (for testing)
    pub fn with_session_config(session: SessionConfig, sink: Arc<dyn DeliverySink>) -> Self {
        let config = AppConfig {
            session,
            relay: RelayConfig {
                initial_backoff_ms: 1,
                ..RelayConfig::default()
            },
            ..AppConfig::default()
        };
        Self::new(&config, sink).0
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
