//! The `change_log` outbox.
//!
//! Local mutations are appended here by the kiosk application (or by
//! [`append`] in tests and tools). The push stage reads pending entries in
//! id order and marks them synced once the server acknowledges the batch.
//! A row is pending exactly while `synced_at` is NULL.

use crate::error::{StoreError, StoreResult};
use rusqlite::{params, params_from_iter, Connection, Row as SqlRow};
use schoolsync_protocol::{ChangeLogEntry, NewChange};
use serde_json::Value;

/// Upper bound on ids bound into a single `UPDATE ... IN (...)`.
const MARK_CHUNK: usize = 500;

const SELECT_COLUMNS: &str =
    "id, entity_type, entity_id, action_type, payload_json, CAST(created_at AS TEXT), CAST(synced_at AS TEXT)";

/// Appends a change and returns its id.
pub fn append(conn: &Connection, change: &NewChange) -> StoreResult<i64> {
    let payload = serde_json::to_string(&change.payload)?;
    conn.execute(
        "INSERT INTO change_log (entity_type, entity_id, action_type, payload_json) VALUES (?1, ?2, ?3, ?4)",
        params![
            change.entity_type,
            change.entity_id,
            change.action_type.as_str(),
            payload
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns up to `limit` pending entries in ascending id order.
pub fn fetch_pending(conn: &Connection, limit: usize) -> StoreResult<Vec<ChangeLogEntry>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM change_log WHERE synced_at IS NULL ORDER BY id ASC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params![limit_param(limit)?], read_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Marks the given entries synced and returns how many rows changed.
///
/// Entries that are already synced keep their original `synced_at`.
/// Callers wanting all-or-nothing semantics should run this inside a
/// transaction (see [`LocalStore::mark_synced`](crate::LocalStore::mark_synced)).
pub fn mark_synced(conn: &Connection, ids: &[i64]) -> StoreResult<usize> {
    let mut changed = 0;
    for chunk in ids.chunks(MARK_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "UPDATE change_log SET synced_at = CURRENT_TIMESTAMP WHERE synced_at IS NULL AND id IN ({placeholders})"
        );
        changed += conn.execute(&sql, params_from_iter(chunk.iter()))?;
    }
    Ok(changed)
}

/// Returns the most recent entries, newest first.
pub fn recent(
    conn: &Connection,
    limit: usize,
    include_synced: bool,
) -> StoreResult<Vec<ChangeLogEntry>> {
    let filter = if include_synced {
        ""
    } else {
        "WHERE synced_at IS NULL"
    };
    let sql = format!("SELECT {SELECT_COLUMNS} FROM change_log {filter} ORDER BY id DESC LIMIT ?1");
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params![limit_param(limit)?], read_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Counts pending entries.
pub fn pending_count(conn: &Connection) -> StoreResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM change_log WHERE synced_at IS NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn limit_param(limit: usize) -> StoreResult<i64> {
    i64::try_from(limit).map_err(|_| StoreError::invalid_data(format!("limit {limit} too large")))
}

fn read_entry(row: &SqlRow<'_>) -> rusqlite::Result<ChangeLogEntry> {
    let payload_text: Option<String> = row.get(4)?;
    let id: i64 = row.get(0)?;
    let payload = match payload_text.as_deref() {
        None | Some("") => Value::Null,
        Some(text) => serde_json::from_str(text).unwrap_or_else(|err| {
            tracing::warn!(change_id = id, error = %err, "change_log payload is not valid JSON");
            Value::String(text.to_string())
        }),
    };
    Ok(ChangeLogEntry {
        id,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        action_type: row.get(3)?,
        payload,
        created_at: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        synced_at: row.get(6)?,
    })
}
