//! Database schema definitions for the local durable store.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- One entry per collection holding the full keyed record map
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    records_json TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

-- Standalone entries: active workout session, sync cursors, push outbox
CREATE TABLE IF NOT EXISTS app_state (
    key TEXT PRIMARY KEY,
    value_json TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

-- Authentication session storage (survives cache clears)
CREATE TABLE IF NOT EXISTS auth_state (
    key TEXT PRIMARY KEY,
    value_json TEXT NOT NULL,
    saved_at TEXT NOT NULL
);
"#;

/// Schema version tracking table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// `app_state` key holding the active workout session id.
pub const ACTIVE_SESSION_ID_KEY: &str = "active_session_id";

/// `app_state` key holding the day ids composed into the active session.
pub const ACTIVE_SESSION_DAY_IDS_KEY: &str = "active_session_day_ids";

/// `app_state` key holding the ad-hoc exercise ids of the active session.
pub const ACTIVE_ADHOC_EXERCISE_IDS_KEY: &str = "active_adhoc_exercise_ids";

/// `app_state` key holding the pending-push outbox.
pub const PENDING_PUSH_KEY: &str = "pending_push";

/// `app_state` key holding per-collection sync cursors.
pub const SYNC_CURSORS_KEY: &str = "sync_cursors";
