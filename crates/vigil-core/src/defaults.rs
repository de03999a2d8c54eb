//! Centralized default constants for the vigil system.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for alert list endpoints.
pub const PAGE_LIMIT: i64 = 50;

/// Maximum page size a caller may request.
pub const PAGE_LIMIT_MAX: i64 = 200;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

/// Maximum request body size in bytes (1 MB). Alert payloads are small;
/// anything larger is a client error.
pub const MAX_BODY_SIZE_BYTES: usize = 1024 * 1024;

// =============================================================================
// SESSIONS
// =============================================================================

/// Outbound frame buffer per WebSocket session. A session whose buffer is
/// full has its frames dropped rather than stalling delivery to others.
pub const SESSION_OUTBOUND_BUFFER: usize = 64;

/// Interval between transport-level keepalive pings on a session.
pub const WS_KEEPALIVE_INTERVAL_SECS: u64 = 30;

// =============================================================================
// RECONNECT
// =============================================================================

/// Base delay before the first reconnect attempt.
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound on the reconnect delay.
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Maximum connections in the PostgreSQL pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Minimum connections kept open in the pool.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Seconds to wait when acquiring a connection from the pool.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Seconds an idle connection may sit in the pool before being closed.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Maximum lifetime of a pooled connection in seconds (30 minutes).
pub const DB_MAX_LIFETIME_SECS: u64 = 1_800;

// =============================================================================
// MESSAGE BUS
// =============================================================================

/// Default channel namespace prefix.
/// Configurable via `ALERT_CHANNEL_NAMESPACE` env var.
pub const CHANNEL_NAMESPACE: &str = "alerts";

// =============================================================================
// FEED CLIENT
// =============================================================================

/// Frames retained in the feed client's in-memory ring buffer.
pub const FEED_RING_CAPACITY: usize = 256;

/// Broadcast channel capacity for feed client subscribers.
pub const FEED_BROADCAST_CAPACITY: usize = 256;
