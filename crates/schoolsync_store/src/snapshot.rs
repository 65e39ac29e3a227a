//! Full-snapshot primitives.
//!
//! A snapshot is a map of table name to row objects. Applying one replaces
//! the contents of every listed local table; exporting one reads the two
//! anchor tables for the manual seed push.

use crate::error::StoreResult;
use crate::schema::is_bookkeeping_table;
use crate::table::{insert_row, quote_ident, table_columns};
use crate::value::read_row;
use rusqlite::Connection;
use schoolsync_protocol::{Row, TableRows};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Tables applied first, in this order, when present in a snapshot.
pub const CORE_TABLE_ORDER: &[&str] = &[
    "students",
    "teachers",
    "classes",
    "messages",
    "time_bonus_schedules",
    "special_bonus_schedules",
];

/// Tables whose emptiness marks a fresh install.
pub const ANCHOR_TABLES: &[&str] = &["students", "teachers"];

/// Transient or server-side tables never replaced from a snapshot.
pub const OPERATIONAL_TABLES: &[&str] = &[
    "android_metadata",
    "schema_migrations",
    "sync_events",
    "changes",
];

/// Columns exported for teachers when seeding the server.
pub const TEACHER_EXPORT_COLUMNS: &[&str] = &[
    "id",
    "name",
    "card_number",
    "card_number2",
    "card_number3",
    "is_admin",
    "can_edit_student_card",
    "can_edit_student_photo",
    "bonus_max_points_per_student",
    "bonus_max_total_runs",
    "bonus_runs_used",
    "bonus_runs_reset_date",
    "bonus_points_used",
    "bonus_points_reset_date",
    "created_at",
    "updated_at",
];

/// Columns exported for students when seeding the server.
pub const STUDENT_EXPORT_COLUMNS: &[&str] = &[
    "id",
    "serial_number",
    "last_name",
    "first_name",
    "class_name",
    "points",
    "card_number",
    "id_number",
    "photo_number",
    "private_message",
    "created_at",
    "updated_at",
];

/// Outcome of [`replace_tables`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Rows inserted per replaced table.
    pub replaced: BTreeMap<String, usize>,
    /// Tables present in the snapshot but left untouched.
    pub skipped: Vec<String>,
}

impl ReplaceReport {
    /// Total rows inserted.
    pub fn total_rows(&self) -> usize {
        self.replaced.values().sum()
    }
}

/// Returns true if a snapshot must never overwrite `table`.
pub fn is_excluded(table: &str, extra_excluded: &[String]) -> bool {
    let lower = table.to_ascii_lowercase();
    lower.starts_with("sqlite_")
        || is_bookkeeping_table(&lower)
        || OPERATIONAL_TABLES.contains(&lower.as_str())
        || extra_excluded.iter().any(|t| t.eq_ignore_ascii_case(table))
}

/// Orders snapshot tables: core tables first, the rest by name.
pub fn apply_order(tables: &TableRows) -> Vec<&str> {
    let mut ordered: Vec<&str> = CORE_TABLE_ORDER
        .iter()
        .copied()
        .filter(|t| tables.contains_key(*t))
        .collect();
    ordered.extend(
        tables
            .keys()
            .map(String::as_str)
            .filter(|t| !CORE_TABLE_ORDER.contains(t)),
    );
    ordered
}

/// Replaces the rows of every eligible table listed in `tables`.
///
/// Excluded tables, tables missing locally and tables with an empty row
/// list are skipped. Row fields that are not local columns are dropped.
/// Run inside a transaction: a failure part-way leaves earlier tables
/// already rewritten.
pub fn replace_tables(
    conn: &Connection,
    tables: &TableRows,
    extra_excluded: &[String],
) -> StoreResult<ReplaceReport> {
    let mut report = ReplaceReport::default();

    for table in apply_order(tables) {
        let rows = match tables.get(table) {
            Some(rows) => rows,
            None => continue,
        };
        if is_excluded(table, extra_excluded) {
            debug!(table, "snapshot table excluded");
            report.skipped.push(table.to_string());
            continue;
        }
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            debug!(table, "snapshot table missing locally");
            report.skipped.push(table.to_string());
            continue;
        }
        if rows.is_empty() {
            debug!(table, "snapshot table has no rows, keeping local rows");
            report.skipped.push(table.to_string());
            continue;
        }

        conn.execute(&format!("DELETE FROM {}", quote_ident(table)), [])?;
        let inserted = insert_rows(conn, table, &columns, rows)?;
        info!(table, count = inserted, "snapshot table replaced");
        report.replaced.insert(table.to_string(), inserted);
    }

    Ok(report)
}

fn insert_rows(
    conn: &Connection,
    table: &str,
    columns: &[String],
    rows: &[Row],
) -> StoreResult<usize> {
    let mut inserted = 0;
    for row in rows {
        inserted += insert_row(conn, table, columns, row, true)?;
    }
    Ok(inserted)
}

/// Reads `table` ordered by id, limited to the wanted columns that exist.
///
/// A missing table yields no rows.
pub fn export_rows(conn: &Connection, table: &str, wanted: &[&str]) -> StoreResult<Vec<Row>> {
    let local: HashSet<String> = table_columns(conn, table)?.into_iter().collect();
    let columns: Vec<String> = wanted
        .iter()
        .filter(|c| local.contains(**c))
        .map(|c| c.to_string())
        .collect();
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let select = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let order = if local.contains("id") { " ORDER BY id ASC" } else { "" };
    let sql = format!("SELECT {select} FROM {}{order}", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| read_row(row, &columns))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Exports teachers and students for the manual seed push.
pub fn export_seed(conn: &Connection) -> StoreResult<(Vec<Row>, Vec<Row>)> {
    let teachers = export_rows(conn, "teachers", TEACHER_EXPORT_COLUMNS)?;
    let students = export_rows(conn, "students", STUDENT_EXPORT_COLUMNS)?;
    Ok((teachers, students))
}
