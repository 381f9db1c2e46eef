//! Canonical schema constants for structured logging
//!
//! These constants keep field names consistent between the store
//! operations that emit them and the tests that assert on them.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_TENANT: &str = "tenant";
pub const FIELD_STREAM_ID: &str = "stream_id";
pub const FIELD_MIGRATION: &str = "migration";

// Collection sizes
pub const FIELD_EVENT_COUNT: &str = "event_count";
pub const FIELD_APPLIED_COUNT: &str = "applied_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
