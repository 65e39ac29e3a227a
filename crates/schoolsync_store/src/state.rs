//! Scalar sync state kept in `sync_state`.

use crate::error::{StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Key of the pull cursor.
pub const PULL_CURSOR_KEY: &str = "pull_since_id";
/// Key of the bootstrap completion flag.
pub const BOOTSTRAP_KEY: &str = "bootstrap_done";
/// Key of the persisted station identity.
pub const STATION_ID_KEY: &str = "station_id";

/// Reads a raw value.
pub fn get(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value: Option<Option<String>> = conn
        .query_row(
            "SELECT value FROM sync_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.flatten())
}

/// Writes a raw value, replacing any previous one.
pub fn set(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO sync_state (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}

/// Returns the pull cursor, `0` if none was stored yet.
pub fn pull_cursor(conn: &Connection) -> StoreResult<i64> {
    match get(conn, PULL_CURSOR_KEY)? {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| StoreError::invalid_data(format!("pull cursor is not an integer: {raw:?}"))),
    }
}

/// Moves the pull cursor forward to `next`.
///
/// Returns false and leaves the stored value untouched when `next` is not
/// greater than the current cursor.
pub fn advance_pull_cursor(conn: &Connection, next: i64) -> StoreResult<bool> {
    let current = pull_cursor(conn)?;
    if next <= current {
        return Ok(false);
    }
    set(conn, PULL_CURSOR_KEY, &next.to_string())?;
    Ok(true)
}

/// Returns true once a snapshot bootstrap has completed.
pub fn is_bootstrapped(conn: &Connection) -> StoreResult<bool> {
    Ok(get(conn, BOOTSTRAP_KEY)?.as_deref() == Some("1"))
}

/// Records that a snapshot bootstrap completed.
pub fn mark_bootstrapped(conn: &Connection) -> StoreResult<()> {
    set(conn, BOOTSTRAP_KEY, "1")
}

/// Returns the persisted station id, if any.
pub fn station_id(conn: &Connection) -> StoreResult<Option<String>> {
    Ok(get(conn, STATION_ID_KEY)?.filter(|id| !id.trim().is_empty()))
}

/// Returns the persisted station id, storing `generate()` first if none exists.
pub fn station_id_or_insert_with<F>(conn: &Connection, generate: F) -> StoreResult<String>
where
    F: FnOnce() -> String,
{
    if let Some(id) = station_id(conn)? {
        return Ok(id);
    }
    let id = generate();
    set(conn, STATION_ID_KEY, &id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_sync_tables;
    use proptest::prelude::*;
    use schoolsync_testkit::{cursor_strategy, event_ids_strategy};

    fn state() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_sync_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn cursor_defaults_to_zero() {
        let conn = state();
        assert_eq!(pull_cursor(&conn).unwrap(), 0);
    }

    #[test]
    fn cursor_only_moves_forward() {
        let conn = state();
        assert!(advance_pull_cursor(&conn, 120).unwrap());
        assert!(!advance_pull_cursor(&conn, 100).unwrap());
        assert!(!advance_pull_cursor(&conn, 120).unwrap());
        assert_eq!(pull_cursor(&conn).unwrap(), 120);

        assert!(advance_pull_cursor(&conn, 121).unwrap());
        assert_eq!(pull_cursor(&conn).unwrap(), 121);
    }

    #[test]
    fn corrupt_cursor_is_an_error() {
        let conn = state();
        set(&conn, PULL_CURSOR_KEY, "abc").unwrap();
        assert!(matches!(
            pull_cursor(&conn),
            Err(StoreError::InvalidData { .. })
        ));
    }

    #[test]
    fn bootstrap_flag() {
        let conn = state();
        assert!(!is_bootstrapped(&conn).unwrap());
        mark_bootstrapped(&conn).unwrap();
        assert!(is_bootstrapped(&conn).unwrap());
    }

    #[test]
    fn station_id_is_generated_once() {
        let conn = state();
        let first = station_id_or_insert_with(&conn, || "st-1".into()).unwrap();
        let second = station_id_or_insert_with(&conn, || "st-2".into()).unwrap();
        assert_eq!(first, "st-1");
        assert_eq!(second, "st-1");
        assert_eq!(station_id(&conn).unwrap().as_deref(), Some("st-1"));
    }

    proptest! {
        #[test]
        fn cursor_is_the_running_maximum(start in cursor_strategy(), ids in event_ids_strategy()) {
            let conn = state();
            advance_pull_cursor(&conn, start).unwrap();
            for id in &ids {
                advance_pull_cursor(&conn, *id).unwrap();
            }
            let expected = ids.iter().copied().fold(start, i64::max);
            prop_assert_eq!(pull_cursor(&conn).unwrap(), expected);
        }
    }
}
