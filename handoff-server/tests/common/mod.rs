//! Shared test utilities for handoff-server integration tests

use std::net::SocketAddr;
use std::sync::Arc;

use handoff_core::{MemorySink, RelayConfig, SessionConfig};
use handoff_server::{AppConfig, AppState, HandoffServer, ServerConfig};
use tokio::net::TcpListener;

/// A running server plus the sink that receives its relays
#[allow(dead_code)]
pub struct TestServer {
    pub state: Arc<AppState>,
    pub addr: SocketAddr,
    pub sink: MemorySink,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Issue a session through the operator API, returning (id, url)
    pub async fn issue(&self, destination: &str) -> (String, String) {
        let body: serde_json::Value = self
            .client
            .post(self.url("/api/sessions"))
            .json(&serde_json::json!({ "destination": destination }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        (
            body["id"].as_str().unwrap().to_string(),
            body["url"].as_str().unwrap().to_string(),
        )
    }

    /// POST a JSON body to a capture callback
    pub async fn callback(
        &self,
        id: &str,
        endpoint: &str,
        body: serde_json::Value,
    ) -> (u16, serde_json::Value) {
        let response = self
            .client
            .post(self.url(&format!("/capture/{}/{}", id, endpoint)))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// Issue a session and record the visitor's consent
    pub async fn consented_session(&self, destination: &str) -> String {
        let (id, _) = self.issue(destination).await;
        let (status, _) = self
            .callback(&id, "consent", serde_json::json!({ "accepted": true }))
            .await;
        assert_eq!(status, 200);
        id
    }
}

/// Creates a test server with default config
#[allow(dead_code)]
pub async fn create_test_server() -> TestServer {
    create_test_server_with_session(SessionConfig::default()).await
}

/// Creates a test server with a custom session config
#[allow(dead_code)]
pub async fn create_test_server_with_session(session: SessionConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = AppConfig {
        server: ServerConfig {
            public_url: Some(format!("http://{}", addr)),
            ..ServerConfig::new("127.0.0.1", addr.port())
        },
        session,
        relay: RelayConfig {
            initial_backoff_ms: 1,
            ..RelayConfig::default()
        },
        ..AppConfig::default()
    };

    let sink = MemorySink::new();
    let server = HandoffServer::with_sink(config, Arc::new(sink.clone()));
    let state = server.state();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    TestServer {
        state,
        addr,
        sink,
        client: reqwest::Client::new(),
    }
}
