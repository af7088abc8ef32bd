//! handoff-server - HTTP server for the handoff capture flow
//!
//! This crate owns the [`AppState`] (session store, issuer, relay handle) and
//! exposes the capture page, its callback endpoints and the operator API.

mod error;
pub mod http;
pub mod middleware;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use handoff_core::{
    CaptureOptions, DeliverySink, LogSink, RelayConfig, SessionConfig, SessionStore, SinkKind,
    WebhookSink,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use error::{ApiError, CallbackResponse, ServerError};
pub use http::create_router;
pub use middleware::{AuthLayer, operator_auth};
pub use state::AppState;

/// How long shutdown waits for queued relay events to be delivered
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The main handoff server
pub struct HandoffServer {
    config: AppConfig,
    state: Arc<AppState>,
    relay_task: Option<JoinHandle<()>>,
}

impl HandoffServer {
    /// Create a server whose sink is chosen by `config.relay`
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        let sink = build_sink(&config.relay)?;
        Ok(Self::with_sink(config, sink))
    }

    /// Create a server that delivers notifications through `sink`
    pub fn with_sink(config: AppConfig, sink: Arc<dyn DeliverySink>) -> Self {
        let (state, relay_task) = AppState::new(&config, sink);
        Self {
            config,
            state: Arc::new(state),
            relay_task: Some(relay_task),
        }
    }

    /// Create a server with custom state (for testing)
    pub fn with_state(config: AppConfig, state: Arc<AppState>) -> Self {
        Self {
            config,
            state,
            relay_task: None,
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.server.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("handoff server listening on {}", addr);
        self.run_with_listener(listener).await
    }

    /// Run the server on an already-bound listener
    ///
    /// Returns after Ctrl-C or `state.shutdown` is cancelled, once the relay
    /// queue has drained or the drain timeout passed.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let Self {
            config,
            state,
            relay_task,
        } = self;

        let shutdown = state.shutdown.clone();
        let sweeper = spawn_session_sweeper(
            Arc::clone(&state.store),
            Duration::from_secs(config.session.sweep_interval_secs.max(1)),
            shutdown.clone(),
        );

        let auth = AuthLayer::new(
            config.server.operator_token.clone(),
            config.server.bypass_localhost,
        );
        let router = create_router(state, auth);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

        shutdown.cancel();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.await;
        }

        if let Some(relay_task) = relay_task {
            match tokio::time::timeout(RELAY_DRAIN_TIMEOUT, relay_task).await {
                Ok(_) => tracing::info!("Relay queue drained"),
                Err(_) => tracing::warn!("Relay queue did not drain before shutdown"),
            }
        }

        Ok(())
    }
}

/// Resolve when Ctrl-C arrives or `token` is cancelled
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                token.cancelled().await;
            }
        }
        _ = token.cancelled() => {}
    }
    tracing::info!("Shutting down handoff server");
}

/// Start a background task that evicts expired sessions
fn spawn_session_sweeper(
    store: Arc<SessionStore>,
    every: Duration,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    store.ttl()?;

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = store.evict_expired().await;
                    if evicted > 0 {
                        tracing::debug!("Evicted {} expired sessions", evicted);
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    }))
}

/// Build the delivery sink selected by the relay configuration
pub fn build_sink(relay: &RelayConfig) -> Result<Arc<dyn DeliverySink>, ServerError> {
    match relay.sink {
        SinkKind::Log => Ok(Arc::new(LogSink)),
        SinkKind::Webhook => {
            let url = relay.webhook_url.as_deref().ok_or_else(|| {
                ServerError::Config("relay.webhook_url is required for the webhook sink".into())
            })?;
            Ok(Arc::new(WebhookSink::new(url)))
        }
    }
}

/// Network settings for the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Externally reachable origin used in access URLs
    pub public_url: Option<String>,
    /// Bearer token required on operator routes
    pub operator_token: Option<String>,
    /// Let loopback clients skip the operator token
    pub bypass_localhost: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7480,
            public_url: None,
            operator_token: None,
            bypass_localhost: true,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Returns the socket address string (e.g., "127.0.0.1:7480")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origin used in access URLs, falling back to the bind address
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.addr()))
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub capture: CaptureOptions,
    #[serde(default)]
    pub relay: RelayConfig,
}
