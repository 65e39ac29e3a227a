//! Connection owner for the station database.

use crate::error::{StoreError, StoreResult};
use crate::{ledger, outbox, schema, snapshot, state, table};
use rusqlite::{Connection, Transaction};
use schoolsync_protocol::{ChangeLogEntry, NewChange, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// How long a statement waits on a lock held by the kiosk application.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The station's local SQLite database.
///
/// Owns a single connection. Free functions in the submodules take a
/// `&Connection` so they compose inside [`LocalStore::transaction`].
#[derive(Debug)]
pub struct LocalStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Opens the database at `path` and ensures the bookkeeping tables.
    ///
    /// The file must already exist; the kiosk application creates it.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database not found: {}", path.display()),
            )));
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::ensure_sync_tables(&conn)?;
        debug!(path = %path.display(), "local store opened");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens an in-memory database. Used by tests and tools.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::ensure_sync_tables(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory containing the database file.
    pub fn directory(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    /// Borrows the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits if `f` returns `Ok`, rolls back otherwise.
    pub fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let out = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    /// Appends a change to the outbox.
    pub fn append_change(&self, change: &NewChange) -> StoreResult<i64> {
        outbox::append(&self.conn, change)
    }

    /// Returns up to `limit` pending outbox entries, oldest first.
    pub fn fetch_pending(&self, limit: usize) -> StoreResult<Vec<ChangeLogEntry>> {
        outbox::fetch_pending(&self.conn, limit)
    }

    /// Marks outbox entries synced, all or nothing.
    pub fn mark_synced(&mut self, ids: &[i64]) -> StoreResult<usize> {
        self.transaction(|tx| outbox::mark_synced(tx, ids))
    }

    /// Returns the newest outbox entries.
    pub fn recent_changes(
        &self,
        limit: usize,
        include_synced: bool,
    ) -> StoreResult<Vec<ChangeLogEntry>> {
        outbox::recent(&self.conn, limit, include_synced)
    }

    /// Counts pending outbox entries.
    pub fn pending_count(&self) -> StoreResult<u64> {
        outbox::pending_count(&self.conn)
    }

    /// Returns the pull cursor.
    pub fn pull_cursor(&self) -> StoreResult<i64> {
        state::pull_cursor(&self.conn)
    }

    /// Returns true once bootstrap completed.
    pub fn is_bootstrapped(&self) -> StoreResult<bool> {
        state::is_bootstrapped(&self.conn)
    }

    /// Returns the persisted station id, generating one if missing.
    pub fn station_id_or_insert_with<F>(&self, generate: F) -> StoreResult<String>
    where
        F: FnOnce() -> String,
    {
        state::station_id_or_insert_with(&self.conn, generate)
    }

    /// Returns true if `event_id` was already applied.
    pub fn is_applied(&self, event_id: &str) -> StoreResult<bool> {
        ledger::is_applied(&self.conn, event_id)
    }

    /// Returns true if the anchor tables are empty or absent.
    pub fn anchors_empty(&self) -> StoreResult<bool> {
        table::tables_empty(&self.conn, snapshot::ANCHOR_TABLES)
    }

    /// Exports teachers and students for the seed push.
    pub fn export_seed(&self) -> StoreResult<(Vec<Row>, Vec<Row>)> {
        snapshot::export_seed(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schoolsync_protocol::ActionType;
    use schoolsync_testkit::TestDatabase;
    use serde_json::json;

    #[test]
    fn open_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalStore::open(dir.path().join("missing.db")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn open_creates_bookkeeping_tables() {
        let db = TestDatabase::new();
        let store = LocalStore::open(db.path()).unwrap();
        assert!(table::table_exists(store.connection(), "change_log").unwrap());
        assert_eq!(store.directory(), db.path().parent());
        assert!(store.anchors_empty().unwrap());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let mut store = LocalStore::open_in_memory().unwrap();
        let result: StoreResult<()> = store.transaction(|tx| {
            state::advance_pull_cursor(tx, 50)?;
            Err(StoreError::invalid_data("boom"))
        });
        assert!(result.is_err());
        assert_eq!(store.pull_cursor().unwrap(), 0);

        store
            .transaction(|tx| state::advance_pull_cursor(tx, 50))
            .unwrap();
        assert_eq!(store.pull_cursor().unwrap(), 50);
    }

    #[test]
    fn outbox_roundtrip_through_facade() {
        let mut store = LocalStore::open_in_memory().unwrap();
        let id = store
            .append_change(&NewChange::new(
                "setting",
                Some("theme".into()),
                ActionType::Update,
                json!({"key": "theme", "value": "dark"}),
            ))
            .unwrap();
        assert_eq!(store.pending_count().unwrap(), 1);
        assert_eq!(store.mark_synced(&[id]).unwrap(), 1);
        assert_eq!(store.pending_count().unwrap(), 0);
        assert_eq!(store.recent_changes(5, true).unwrap().len(), 1);
    }
}
