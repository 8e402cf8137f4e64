//! API Configuration Module
//!
//! Server, lifecycle and transport settings. Configuration is loaded from
//! environment variables with defaults suitable for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_AGENT_REQUEST_TIMEOUT_SECS, DEFAULT_BACKEND_URL, DEFAULT_BATTLE_TIMEOUT_SECS,
    DEFAULT_BIND_HOST, DEFAULT_PORT, DEFAULT_READY_POLL_INTERVAL_SECS,
    DEFAULT_READY_TIMEOUT_SECS, DEFAULT_WORKER_IDLE_MS, DEFAULT_WS_CHANNEL_CAPACITY,
};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// LOG FORMAT
// ============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ApiError::invalid_input(format!(
                "Unknown log format '{}', expected json or pretty",
                other
            ))),
        }
    }
}

// ============================================================================
// ARENA CONFIGURATION
// ============================================================================

/// Arena server configuration.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    // ========================================================================
    // Server
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    /// Public base URL agents use to call back into this server.
    pub backend_url: String,

    /// Allowed CORS origins. Empty means allow all origins.
    pub cors_origins: Vec<String>,

    pub log_format: LogFormat,

    // ========================================================================
    // Battle lifecycle
    // ========================================================================
    /// Upper bound of the ready wait.
    pub ready_timeout: Duration,

    pub ready_poll_interval: Duration,

    /// Watchdog timeout when the green agent declares none.
    pub default_battle_timeout: Duration,

    /// Admission worker sleep between iterations.
    pub worker_idle: Duration,

    // ========================================================================
    // Transport
    // ========================================================================
    /// Capacity of each WebSocket subscriber's outbound queue.
    pub ws_channel_capacity: usize,

    pub agent_request_timeout: Duration,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            cors_origins: Vec::new(),
            log_format: LogFormat::default(),
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            ready_poll_interval: Duration::from_secs(DEFAULT_READY_POLL_INTERVAL_SECS),
            default_battle_timeout: Duration::from_secs(DEFAULT_BATTLE_TIMEOUT_SECS),
            worker_idle: Duration::from_millis(DEFAULT_WORKER_IDLE_MS),
            ws_channel_capacity: DEFAULT_WS_CHANNEL_CAPACITY,
            agent_request_timeout: Duration::from_secs(DEFAULT_AGENT_REQUEST_TIMEOUT_SECS),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl ArenaConfig {
    /// Create ArenaConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ARENA_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` / `ARENA_API_PORT`: Bind port (default: 9000)
    /// - `ARENA_BACKEND_URL`: Callback URL handed to agents
    /// - `ARENA_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `ARENA_LOG_FORMAT`: "json" or "pretty" (default: pretty)
    /// - `ARENA_READY_TIMEOUT_SECS` (default: 120)
    /// - `ARENA_READY_POLL_INTERVAL_SECS` (default: 5)
    /// - `ARENA_DEFAULT_BATTLE_TIMEOUT_SECS` (default: 300)
    /// - `ARENA_WORKER_IDLE_MS` (default: 500)
    /// - `ARENA_WS_CHANNEL_CAPACITY` (default: 256)
    /// - `ARENA_AGENT_REQUEST_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> ApiResult<Self> {
        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("ARENA_API_PORT").ok())
        {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", value)))?,
            None => DEFAULT_PORT,
        };

        let cors_origins = std::env::var("ARENA_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let log_format = match std::env::var("ARENA_LOG_FORMAT") {
            Ok(value) => value.parse()?,
            Err(_) => LogFormat::default(),
        };

        let backend_url = std::env::var("ARENA_BACKEND_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());

        Ok(Self {
            bind_host: std::env::var("ARENA_API_BIND")
                .unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string()),
            port,
            backend_url,
            cors_origins,
            log_format,
            ready_timeout: Duration::from_secs(env_parse(
                "ARENA_READY_TIMEOUT_SECS",
                DEFAULT_READY_TIMEOUT_SECS,
            )),
            ready_poll_interval: Duration::from_secs(env_parse(
                "ARENA_READY_POLL_INTERVAL_SECS",
                DEFAULT_READY_POLL_INTERVAL_SECS,
            )),
            default_battle_timeout: Duration::from_secs(env_parse(
                "ARENA_DEFAULT_BATTLE_TIMEOUT_SECS",
                DEFAULT_BATTLE_TIMEOUT_SECS,
            )),
            worker_idle: Duration::from_millis(env_parse(
                "ARENA_WORKER_IDLE_MS",
                DEFAULT_WORKER_IDLE_MS,
            )),
            ws_channel_capacity: env_parse(
                "ARENA_WS_CHANNEL_CAPACITY",
                DEFAULT_WS_CHANNEL_CAPACITY,
            )
            .max(1),
            agent_request_timeout: Duration::from_secs(env_parse(
                "ARENA_AGENT_REQUEST_TIMEOUT_SECS",
                DEFAULT_AGENT_REQUEST_TIMEOUT_SECS,
            )),
        })
    }

    /// Socket address the HTTP server binds to.
    pub fn socket_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    /// Battle timeout for a green agent, falling back to the default.
    pub fn battle_timeout(&self, declared_secs: Option<u64>) -> Duration {
        declared_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.default_battle_timeout)
    }
}
