use super::types::{
    RawCaptureConfig, RawHandoffConfig, RawRelayConfig, RawServerConfig, RawSessionConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use handoff_core::{CaptureOptions, RelayConfig, SessionConfig};
use handoff_server::{AppConfig, ServerConfig};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<AppConfig> {
        let mut raw = RawHandoffConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "handoff").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with HANDOFF_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("HANDOFF_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".handoff/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawHandoffConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawHandoffConfig, overlay: RawHandoffConfig) -> RawHandoffConfig {
        RawHandoffConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
                public_url: overlay.server.public_url.or(base.server.public_url),
                operator_token: overlay.server.operator_token.or(base.server.operator_token),
                bypass_localhost: overlay
                    .server
                    .bypass_localhost
                    .or(base.server.bypass_localhost),
            },
            session: RawSessionConfig {
                ttl_secs: overlay.session.ttl_secs.or(base.session.ttl_secs),
                sweep_interval_secs: overlay
                    .session
                    .sweep_interval_secs
                    .or(base.session.sweep_interval_secs),
                replay: overlay.session.replay.or(base.session.replay),
            },
            capture: RawCaptureConfig {
                title: overlay.capture.title.or(base.capture.title),
                purpose: overlay.capture.purpose.or(base.capture.purpose),
                providers: overlay.capture.providers.or(base.capture.providers),
                plans: overlay.capture.plans.or(base.capture.plans),
                max_photo_bytes: overlay
                    .capture
                    .max_photo_bytes
                    .or(base.capture.max_photo_bytes),
            },
            relay: RawRelayConfig {
                sink: overlay.relay.sink.or(base.relay.sink),
                webhook_url: overlay.relay.webhook_url.or(base.relay.webhook_url),
                queue_capacity: overlay.relay.queue_capacity.or(base.relay.queue_capacity),
                max_attempts: overlay.relay.max_attempts.or(base.relay.max_attempts),
                initial_backoff_ms: overlay
                    .relay
                    .initial_backoff_ms
                    .or(base.relay.initial_backoff_ms),
                dead_letter_capacity: overlay
                    .relay
                    .dead_letter_capacity
                    .or(base.relay.dead_letter_capacity),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawHandoffConfig) -> AppConfig {
        let server = ServerConfig::default();
        let session = SessionConfig::default();
        let capture = CaptureOptions::default();
        let relay = RelayConfig::default();

        AppConfig {
            server: ServerConfig {
                host: raw.server.host.unwrap_or(server.host),
                port: raw.server.port.unwrap_or(server.port),
                public_url: raw.server.public_url,
                operator_token: raw.server.operator_token,
                bypass_localhost: raw.server.bypass_localhost.unwrap_or(server.bypass_localhost),
            },
            session: SessionConfig {
                ttl_secs: raw.session.ttl_secs.unwrap_or(session.ttl_secs),
                sweep_interval_secs: raw
                    .session
                    .sweep_interval_secs
                    .unwrap_or(session.sweep_interval_secs),
                replay: raw.session.replay.unwrap_or(session.replay),
            },
            capture: CaptureOptions {
                title: raw.capture.title.unwrap_or(capture.title),
                purpose: raw.capture.purpose.unwrap_or(capture.purpose),
                providers: raw.capture.providers.unwrap_or(capture.providers),
                plans: raw.capture.plans.unwrap_or(capture.plans),
                max_photo_bytes: raw.capture.max_photo_bytes.unwrap_or(capture.max_photo_bytes),
            },
            relay: RelayConfig {
                sink: raw.relay.sink.unwrap_or(relay.sink),
                webhook_url: raw.relay.webhook_url,
                queue_capacity: raw.relay.queue_capacity.unwrap_or(relay.queue_capacity),
                max_attempts: raw.relay.max_attempts.unwrap_or(relay.max_attempts),
                initial_backoff_ms: raw
                    .relay
                    .initial_backoff_ms
                    .unwrap_or(relay.initial_backoff_ms),
                dead_letter_capacity: raw
                    .relay
                    .dead_letter_capacity
                    .unwrap_or(relay.dead_letter_capacity),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::{ReplayPolicy, SinkKind};
    use serial_test::serial;
    use tempfile::TempDir;

    fn raw(toml_str: &str) -> RawHandoffConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_finalize_applies_defaults() {
        let config = ConfigLoader::finalize(RawHandoffConfig::default());
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7480);
        assert!(config.server.bypass_localhost);
        assert_eq!(config.session.ttl_secs, 86400);
        assert_eq!(config.session.replay, ReplayPolicy::Allow);
        assert_eq!(config.relay.sink, SinkKind::Log);
        assert_eq!(config.capture.plans, vec!["10", "25", "50"]);
    }

    #[test]
    fn test_merge_overlay_wins_only_when_set() {
        let base = raw(r#"
[server]
host = "0.0.0.0"
port = 8000

[relay]
max_attempts = 7
"#);
        let overlay = raw(r#"
[server]
port = 9000

[session]
replay = "reject"
"#);

        let config = ConfigLoader::finalize(ConfigLoader::merge_raw(base, overlay));
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.session.replay, ReplayPolicy::Reject);
        assert_eq!(config.relay.max_attempts, 7);
    }

    #[test]
    fn test_merge_can_turn_off_localhost_bypass() {
        let base = raw("[server]\nbypass_localhost = true\n");
        let overlay = raw("[server]\nbypass_localhost = false\n");

        let config = ConfigLoader::finalize(ConfigLoader::merge_raw(base, overlay));
        assert!(!config.server.bypass_localhost);
    }

    #[test]
    #[serial]
    fn test_project_config_dir_override() {
        let dir = TempDir::new().unwrap();
        // SAFETY: serialized with other env-touching tests
        unsafe { std::env::set_var("HANDOFF_PROJECT_CONFIG_DIR", dir.path()) };

        assert_eq!(
            ConfigLoader::project_config_path(),
            dir.path().join("config.toml")
        );

        unsafe { std::env::remove_var("HANDOFF_PROJECT_CONFIG_DIR") };
        assert_eq!(
            ConfigLoader::project_config_path(),
            PathBuf::from(".handoff/config.toml")
        );
    }

    #[test]
    #[serial]
    fn test_load_reads_project_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
[server]
port = 9123
operator_token = "s3cret"

[capture]
title = "Club sign-up"
"#,
        )
        .unwrap();
        // SAFETY: serialized with other env-touching tests
        unsafe { std::env::set_var("HANDOFF_PROJECT_CONFIG_DIR", dir.path()) };

        let config = ConfigLoader::load();
        unsafe { std::env::remove_var("HANDOFF_PROJECT_CONFIG_DIR") };

        let config = config.unwrap();
        assert_eq!(config.server.port, 9123);
        assert_eq!(config.server.operator_token.as_deref(), Some("s3cret"));
        assert_eq!(config.capture.title, "Club sign-up");
    }

    #[test]
    #[serial]
    fn test_load_reports_invalid_toml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[server\nport = ").unwrap();
        // SAFETY: serialized with other env-touching tests
        unsafe { std::env::set_var("HANDOFF_PROJECT_CONFIG_DIR", dir.path()) };

        let result = ConfigLoader::load();
        unsafe { std::env::remove_var("HANDOFF_PROJECT_CONFIG_DIR") };

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("parsing"));
    }
}
