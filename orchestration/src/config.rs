//! Server configuration, environment-driven with per-flag overrides in
//! `main`.

use std::time::Duration;

use crate::orchestrator::OrchestratorSettings;
use crate::token::TokenService;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration for the orchestrator server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the server binds.
    pub bind_addr: String,
    /// Public base URL used in invitation redemption links.
    pub public_base_url: String,
    /// Judging gateway endpoint.
    pub judge_url: String,
    /// Bound on a single judging call, in seconds.
    pub judge_timeout_secs: u64,
    /// Shared secret signing transport tokens.
    pub token_secret: String,
    /// Transport token TTL, in seconds.
    pub transport_token_ttl_secs: i64,
    /// Invitation token TTL, in seconds.
    pub invitation_ttl_secs: i64,
    /// Max judging retries per session within the window.
    pub retry_limit: u32,
    pub retry_window_secs: u64,
    /// Whether non-participants may join session rooms.
    pub allow_observers: bool,
    /// Per-connection heartbeat cadence, in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: env_or("ARENA_BIND_ADDR", "127.0.0.1:8080"),
            public_base_url: env_or("ARENA_PUBLIC_URL", "http://localhost:8080"),
            judge_url: env_or("ARENA_JUDGE_URL", "http://127.0.0.1:8090/judge"),
            judge_timeout_secs: env_parse("ARENA_JUDGE_TIMEOUT_SECS", 30),
            token_secret: env_or("ARENA_TOKEN_SECRET", "dev-secret-change-me"),
            transport_token_ttl_secs: env_parse("ARENA_TRANSPORT_TTL_SECS", 3600),
            invitation_ttl_secs: env_parse("ARENA_INVITATION_TTL_SECS", 86_400),
            retry_limit: env_parse("ARENA_RETRY_LIMIT", 3),
            retry_window_secs: env_parse("ARENA_RETRY_WINDOW_SECS", 60),
            allow_observers: env_parse("ARENA_ALLOW_OBSERVERS", false),
            heartbeat_interval_secs: env_parse("ARENA_HEARTBEAT_SECS", 15),
        }
    }
}

impl ServerConfig {
    /// The orchestrator's slice of this configuration.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            judge_timeout: Duration::from_secs(self.judge_timeout_secs),
            redemption_base_url: self.public_base_url.clone(),
            retry_limit: self.retry_limit,
            retry_window: Duration::from_secs(self.retry_window_secs),
        }
    }

    /// Token service sharing this configuration's secret and TTLs.
    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            self.token_secret.clone(),
            chrono::Duration::seconds(self.invitation_ttl_secs),
            chrono::Duration::seconds(self.transport_token_ttl_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(!config.bind_addr.is_empty());
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.orchestrator_settings().retry_window.as_secs(), 60);
    }
}
