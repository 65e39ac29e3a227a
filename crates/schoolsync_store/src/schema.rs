//! Sync bookkeeping schema.
//!
//! The three tables below belong to the agent. They are created on open if
//! missing and are never part of a snapshot in either direction.

use crate::error::StoreResult;
use rusqlite::Connection;

/// Outbox of local mutations.
pub const CHANGE_LOG_TABLE: &str = "change_log";
/// Scalar sync state (cursor, flags, identity).
pub const SYNC_STATE_TABLE: &str = "sync_state";
/// Idempotency ledger of applied remote events.
pub const APPLIED_EVENTS_TABLE: &str = "applied_events";

/// Tables owned by the sync agent.
pub const BOOKKEEPING_TABLES: &[&str] = &[CHANGE_LOG_TABLE, SYNC_STATE_TABLE, APPLIED_EVENTS_TABLE];

const SYNC_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS change_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT,
    action_type TEXT NOT NULL,
    payload_json TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    synced_at TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_change_log_pending ON change_log(synced_at, id);

CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS applied_events (
    event_id TEXT PRIMARY KEY,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Creates the bookkeeping tables if they do not exist.
pub fn ensure_sync_tables(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SYNC_SCHEMA)?;
    Ok(())
}

/// Returns true if `table` is one of the agent's own tables.
pub fn is_bookkeeping_table(table: &str) -> bool {
    BOOKKEEPING_TABLES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(table))
}
