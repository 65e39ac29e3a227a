//! Schema introspection.
//!
//! The user-data schema is owned by the kiosk application and may differ
//! between stations running different versions. Every write path checks
//! the live schema first and only touches tables and columns that exist.

use crate::error::StoreResult;
use crate::schema::is_bookkeeping_table;
use crate::value::{filter_to_columns, json_to_sql};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use schoolsync_protocol::Row;

/// Quotes an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Returns true if a table with this name exists.
pub fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Returns the column names of `table`, in declaration order.
///
/// A missing table yields an empty list.
pub fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Lists user tables, excluding SQLite internals and the agent's own tables.
pub fn user_tables(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names
        .into_iter()
        .filter(|name| !is_bookkeeping_table(name))
        .collect())
}

/// Counts rows in `table`. A missing table counts as zero.
pub fn row_count(conn: &Connection, table: &str) -> StoreResult<i64> {
    if !table_exists(conn, table)? {
        return Ok(0);
    }
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

/// Returns true if every listed table is empty or absent.
pub fn tables_empty(conn: &Connection, tables: &[&str]) -> StoreResult<bool> {
    for table in tables {
        if row_count(conn, table)? > 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Inserts the fields of `row` that are columns of `table`.
///
/// With `replace`, a row with the same primary key is overwritten.
/// Returns 0 without touching the table when no field matches a column.
pub fn insert_row(
    conn: &Connection,
    table: &str,
    columns: &[String],
    row: &Row,
    replace: bool,
) -> StoreResult<usize> {
    let fields = filter_to_columns(row, columns);
    if fields.is_empty() {
        return Ok(0);
    }
    let names: Vec<String> = fields.iter().map(|(k, _)| quote_ident(k)).collect();
    let placeholders = vec!["?"; fields.len()].join(", ");
    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
    let sql = format!(
        "{verb} INTO {} ({}) VALUES ({placeholders})",
        quote_ident(table),
        names.join(", ")
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.execute(params_from_iter(fields.iter().map(|(_, v)| json_to_sql(v))))?)
}

/// Updates the rows of `table` where `key_column = key`.
///
/// Only fields that are columns are written, and the key column itself is
/// never rewritten. Returns the number of rows changed.
pub fn update_rows(
    conn: &Connection,
    table: &str,
    columns: &[String],
    row: &Row,
    key_column: &str,
    key: SqlValue,
) -> StoreResult<usize> {
    let fields: Vec<_> = filter_to_columns(row, columns)
        .into_iter()
        .filter(|(k, _)| *k != key_column)
        .collect();
    if fields.is_empty() {
        return Ok(0);
    }
    let assignments = fields
        .iter()
        .map(|(k, _)| format!("{} = ?", quote_ident(k)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {assignments} WHERE {} = ?",
        quote_ident(table),
        quote_ident(key_column)
    );
    let mut values: Vec<SqlValue> = fields.iter().map(|(_, v)| json_to_sql(v)).collect();
    values.push(key);
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.execute(params_from_iter(values))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_sync_tables;
    use schoolsync_testkit::{apply_school_schema, insert_student, student_points};
    use serde_json::json;

    fn school() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_school_schema(&conn);
        ensure_sync_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_ident("students"), "\"students\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn columns_of_existing_and_missing_tables() {
        let conn = school();
        let columns = table_columns(&conn, "students").unwrap();
        assert!(columns.contains(&"serial_number".to_string()));
        assert!(columns.contains(&"points".to_string()));

        assert!(table_columns(&conn, "no_such_table").unwrap().is_empty());
    }

    #[test]
    fn user_tables_skip_bookkeeping() {
        let conn = school();
        let tables = user_tables(&conn).unwrap();
        assert!(tables.contains(&"students".to_string()));
        assert!(!tables.contains(&"change_log".to_string()));
        assert!(!tables.contains(&"applied_events".to_string()));
    }

    #[test]
    fn emptiness_checks() {
        let conn = school();
        assert!(tables_empty(&conn, &["students", "teachers"]).unwrap());
        assert!(tables_empty(&conn, &["no_such_table"]).unwrap());

        insert_student(&conn, 1, "S1", "Dana", "Levi", Some("A1"), 10);
        assert!(!tables_empty(&conn, &["students", "teachers"]).unwrap());
        assert_eq!(row_count(&conn, "students").unwrap(), 1);
    }

    #[test]
    fn insert_and_update_only_touch_local_columns() {
        let conn = school();
        let columns = table_columns(&conn, "students").unwrap();
        let row = json!({"id": 5, "first_name": "Avi", "last_name": "Bar", "points": 3, "remote_flag": true});
        let row = row.as_object().unwrap();

        assert_eq!(insert_row(&conn, "students", &columns, row, false).unwrap(), 1);
        assert_eq!(student_points(&conn, 5), Some(3));

        let patch = json!({"id": 99, "points": 8, "ghost": 1});
        let changed = update_rows(
            &conn,
            "students",
            &columns,
            patch.as_object().unwrap(),
            "id",
            SqlValue::Integer(5),
        )
        .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(student_points(&conn, 5), Some(8));
        assert_eq!(student_points(&conn, 99), None);
    }

    #[test]
    fn rows_without_local_columns_are_not_written() {
        let conn = school();
        let columns = table_columns(&conn, "students").unwrap();
        let row = json!({"ghost": 1});
        assert_eq!(insert_row(&conn, "students", &columns, row.as_object().unwrap(), true).unwrap(), 0);
        assert_eq!(row_count(&conn, "students").unwrap(), 0);
    }
}
