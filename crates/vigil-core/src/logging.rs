//! Structured logging schema and field name constants for vigil.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (frames, fan-out) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → publish → delivery.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "realtime", "client"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "registry", "bridge", "publisher", "pool", "feed"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "publish", "route", "transition", "register"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Alert UUID being operated on.
pub const ALERT_ID: &str = "alert_id";

/// Patient UUID an alert or status change refers to.
pub const PATIENT_ID: &str = "patient_id";

/// Organization UUID scoping the operation.
pub const ORGANIZATION_ID: &str = "organization_id";

/// Operator UUID acting or being targeted.
pub const OPERATOR_ID: &str = "operator_id";

/// WebSocket session UUID.
pub const SESSION_ID: &str = "session_id";

/// Monitoring rule that raised an alert.
pub const RULE_KEY: &str = "rule_key";

// ─── Realtime fields ───────────────────────────────────────────────────────

/// Bus channel an event was published on or received from.
pub const CHANNEL: &str = "channel";

/// Frame kind being delivered ("alert_created", "pong", ...).
pub const FRAME_KIND: &str = "frame_kind";

/// Reconnect attempt counter.
pub const ATTEMPT: &str = "attempt";

/// Number of sessions touched by a fan-out.
pub const SESSION_COUNT: &str = "session_count";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows or events returned by an operation.
pub const RESULT_COUNT: &str = "result_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
