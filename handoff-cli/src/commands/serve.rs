//! Run the handoff server in the foreground
//!
//! Flags override the merged config files for the values most often changed
//! from the command line.

use anyhow::Result;
use clap::Args;
use handoff_core::ReplayPolicy;
use handoff_server::{AppConfig, HandoffServer};
use tracing::info;

use crate::config::ConfigLoader;

/// Arguments for the serve command
#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Externally reachable origin used in access URLs
    #[arg(long)]
    pub public_url: Option<String>,

    /// Refuse a second submission on a used session
    #[arg(long)]
    pub reject_replay: bool,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = apply_args(ConfigLoader::load()?, args);

    info!(
        "Starting handoff server on {}:{} (sink: {:?}, replay: {:?})",
        config.server.host, config.server.port, config.relay.sink, config.session.replay
    );
    if config.server.operator_token.is_none() && !config.server.bypass_localhost {
        tracing::warn!("No operator token set; operator routes are open to any client");
    }

    let server = HandoffServer::new(config)?;
    server.run().await.map_err(Into::into)
}

fn apply_args(mut config: AppConfig, args: ServeArgs) -> AppConfig {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(public_url) = args.public_url {
        config.server.public_url = Some(public_url);
    }
    if args.reject_replay {
        config.session.replay = ReplayPolicy::Reject;
    }
    config
}
