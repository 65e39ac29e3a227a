//! The `applied_events` idempotency ledger.

use crate::error::StoreResult;
use rusqlite::{params, Connection, OptionalExtension};

/// Returns true if `event_id` was already applied.
pub fn is_applied(conn: &Connection, event_id: &str) -> StoreResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM applied_events WHERE event_id = ?1",
            params![event_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Records `event_id` as applied.
///
/// Returns false if it was already present.
pub fn record_applied(conn: &Connection, event_id: &str) -> StoreResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO applied_events (event_id) VALUES (?1)",
        params![event_id],
    )?;
    Ok(inserted == 1)
}

/// Number of recorded events.
pub fn applied_count(conn: &Connection) -> StoreResult<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM applied_events", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_sync_tables;

    #[test]
    fn records_each_event_once() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_sync_tables(&conn).unwrap();

        assert!(!is_applied(&conn, "e-1").unwrap());
        assert!(record_applied(&conn, "e-1").unwrap());
        assert!(!record_applied(&conn, "e-1").unwrap());
        assert!(is_applied(&conn, "e-1").unwrap());
        assert_eq!(applied_count(&conn).unwrap(), 1);
    }
}
