//! Constants for the Arena API
//!
//! Default values for every tunable in [`crate::config::ArenaConfig`].

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 9000;

/// Default public callback URL handed to agents
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:9000";

// ============================================================================
// BATTLE LIFECYCLE
// ============================================================================

/// How long the driver waits for every participant to report ready
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 120;

/// Interval between readiness polls
pub const DEFAULT_READY_POLL_INTERVAL_SECS: u64 = 5;

/// Battle timeout used when the green agent declares none
pub const DEFAULT_BATTLE_TIMEOUT_SECS: u64 = 300;

/// Admission worker sleep between iterations
pub const DEFAULT_WORKER_IDLE_MS: u64 = 500;

// ============================================================================
// TRANSPORT
// ============================================================================

/// Per-subscriber outbound WebSocket queue capacity
pub const DEFAULT_WS_CHANNEL_CAPACITY: usize = 256;

/// HTTP timeout for outbound protocol calls
pub const DEFAULT_AGENT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Reporter name stamped on ingested events that do not carry one
pub const DEFAULT_EVENT_REPORTER: &str = "agent";
