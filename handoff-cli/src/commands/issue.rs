//! Issue a session against a running server through the operator API

use anyhow::{Context, Result, bail};
use clap::Args;
use handoff_core::IssuedSession;
use serde_json::json;

use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct IssueArgs {
    /// Destination that receives this session's relays
    pub destination: String,

    /// Server to contact (defaults to the configured bind address)
    #[arg(long)]
    pub server: Option<String>,

    /// Operator token (defaults to server.operator_token from config)
    #[arg(long, env = "HANDOFF_OPERATOR_TOKEN")]
    pub token: Option<String>,
}

pub async fn run(args: IssueArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let base = args
        .server
        .unwrap_or_else(|| format!("http://{}", config.server.addr()));
    let token = args.token.or(config.server.operator_token);

    let issued = issue(&base, token.as_deref(), &args.destination).await?;
    println!("Session: {}", issued.id);
    println!("URL:     {}", issued.url);
    Ok(())
}

async fn issue(base: &str, token: Option<&str>, destination: &str) -> Result<IssuedSession> {
    let url = format!("{}/api/sessions", base.trim_end_matches('/'));
    let mut request = reqwest::Client::new()
        .post(&url)
        .json(&json!({ "destination": destination }));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("contacting {}", url))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("server returned {}: {}", status, body);
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use handoff_core::MemorySink;
    use handoff_server::{AppConfig, HandoffServer, ServerConfig};
    use tokio::net::TcpListener;

    async fn spawn_server(token: Option<&str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = AppConfig {
            server: ServerConfig {
                operator_token: token.map(str::to_string),
                bypass_localhost: false,
                ..ServerConfig::new("127.0.0.1", addr.port())
            },
            ..AppConfig::default()
        };
        let server = HandoffServer::with_sink(config, Arc::new(MemorySink::new()));
        tokio::spawn(async move {
            let _ = server.run_with_listener(listener).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_issue_returns_access_url() {
        let base = spawn_server(Some("s3cret")).await;

        let issued = issue(&base, Some("s3cret"), "chat-1").await.unwrap();
        assert_eq!(issued.url, format!("{}/capture/{}", base, issued.id));
    }

    #[tokio::test]
    async fn test_issue_without_token_is_refused() {
        let base = spawn_server(Some("s3cret")).await;

        let err = issue(&base, None, "chat-1").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
