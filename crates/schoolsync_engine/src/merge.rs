//! Per-entity merge handlers.
//!
//! Each [`EntityChange`] variant has exactly one handler here. Handlers run
//! against the connection of the pull batch transaction and never commit.
//! They only touch tables and columns present in the local schema; a
//! change aimed at something the station does not have is skipped rather
//! than failed.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use schoolsync_protocol::{
    ActionType, EntityChange, ListItemChange, ListKind, PointsAdjustment, RecordChange,
    RecordKind, RemoteChangeEvent, Row,
};
use schoolsync_store::table::{insert_row, table_columns, table_exists, update_rows};
use schoolsync_store::StoreResult;
use serde_json::Value;
use tracing::{debug, warn};

/// Storage format for timestamps written by the agent.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of applying one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The change was written.
    Applied {
        /// Rows touched.
        rows: usize,
    },
    /// The change was understood but left local state untouched.
    Skipped {
        /// Why nothing was written.
        reason: String,
    },
}

impl MergeOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        MergeOutcome::Skipped {
            reason: reason.into(),
        }
    }

    /// Returns true if local state was written.
    pub fn is_applied(&self) -> bool {
        matches!(self, MergeOutcome::Applied { .. })
    }
}

/// Applies one remote change.
pub fn apply_change(conn: &Connection, event: &RemoteChangeEvent) -> StoreResult<MergeOutcome> {
    match &event.change {
        EntityChange::PointsAdjusted(adjustment) => merge_points(conn, adjustment),
        EntityChange::Record(record) if record.action == ActionType::Delete => {
            delete_record(conn, record)
        }
        EntityChange::Record(record) => upsert_record(conn, record),
        EntityChange::ClassRenamed { old_name, new_name } => {
            rename_class(conn, old_name, new_name)
        }
        EntityChange::ClassRemoved { name } => remove_class(conn, name),
        EntityChange::SettingChanged { key, value } => {
            merge_setting(conn, key, value.as_deref(), event.created_at.as_deref())
        }
        EntityChange::ListItem(item) => replace_list_item(conn, item),
        EntityChange::Unrecognized { reason } => Ok(MergeOutcome::skipped(reason.clone())),
    }
}

fn record_table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Student => "students",
        RecordKind::Teacher => "teachers",
        RecordKind::Product => "products",
    }
}

fn natural_key(kind: RecordKind) -> Option<&'static str> {
    match kind {
        RecordKind::Student => Some("serial_number"),
        RecordKind::Teacher => Some("card_number"),
        RecordKind::Product => None,
    }
}

fn list_table(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Message => "messages",
        ListKind::News => "news_items",
        ListKind::Ad => "ads_items",
    }
}

fn row_exists(conn: &Connection, table: &str, column: &str, key: &SqlValue) -> StoreResult<bool> {
    let sql = format!("SELECT 1 FROM \"{table}\" WHERE \"{column}\" = ?1 LIMIT 1");
    let found: Option<i64> = conn.query_row(&sql, params![key], |row| row.get(0)).optional()?;
    Ok(found.is_some())
}

/// Adds `new - old` to the local balance and records the adjustment.
fn merge_points(conn: &Connection, adjustment: &PointsAdjustment) -> StoreResult<MergeOutcome> {
    let current: Option<i64> = conn
        .query_row(
            "SELECT COALESCE(points, 0) FROM students WHERE id = ?1",
            params![adjustment.student_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(current) = current else {
        return Ok(MergeOutcome::skipped(format!(
            "student {} not found",
            adjustment.student_id
        )));
    };

    let Some(delta) = adjustment.delta() else {
        return Ok(MergeOutcome::skipped("delta out of range"));
    };
    if delta == 0 {
        return Ok(MergeOutcome::skipped("zero delta"));
    }
    let Some(updated) = current.checked_add(delta) else {
        warn!(
            student_id = adjustment.student_id,
            current,
            delta,
            "points balance would overflow"
        );
        return Ok(MergeOutcome::skipped("balance out of range"));
    };

    let mut rows = conn.execute(
        "UPDATE students SET points = ?1 WHERE id = ?2",
        params![updated, adjustment.student_id],
    )?;

    let log_columns = table_columns(conn, "points_log")?;
    if !log_columns.is_empty() {
        let mut entry = Row::new();
        entry.insert("student_id".into(), adjustment.student_id.into());
        entry.insert("old_points".into(), current.into());
        entry.insert("new_points".into(), updated.into());
        entry.insert("delta".into(), delta.into());
        entry.insert(
            "reason".into(),
            adjustment
                .reason
                .clone()
                .map_or(Value::String("sync".into()), Value::String),
        );
        entry.insert("actor_name".into(), "sync".into());
        entry.insert("action_type".into(), "sync".into());
        rows += insert_row(conn, "points_log", &log_columns, &entry, false)?;
    }

    debug!(
        student_id = adjustment.student_id,
        delta,
        balance = updated,
        "points merged"
    );
    Ok(MergeOutcome::Applied { rows })
}

/// Upserts a record by id, falling back to its natural key.
fn upsert_record(conn: &Connection, record: &RecordChange) -> StoreResult<MergeOutcome> {
    let table = record_table(record.kind);
    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        return Ok(MergeOutcome::skipped(format!("table {table} missing")));
    }

    let mut fields = record.fields.clone();
    if let Some(id) = record.id {
        fields.insert("id".into(), id.into());
        let key = SqlValue::Integer(id);
        if row_exists(conn, table, "id", &key)? {
            let rows = update_rows(conn, table, &columns, &fields, "id", key)?;
            return Ok(MergeOutcome::Applied { rows });
        }
    }

    if let Some(column) = natural_key(record.kind) {
        let candidate = fields
            .get(column)
            .filter(|v| !v.is_null())
            .map(schoolsync_store::value::json_to_sql);
        if let Some(key) = candidate {
            if columns.iter().any(|c| c == column) && row_exists(conn, table, column, &key)? {
                // Local id wins on a natural-key match.
                fields.remove("id");
                let rows = update_rows(conn, table, &columns, &fields, column, key)?;
                return Ok(MergeOutcome::Applied { rows });
            }
        }
    }

    let rows = insert_row(conn, table, &columns, &fields, false)?;
    Ok(MergeOutcome::Applied { rows })
}

fn delete_record(conn: &Connection, record: &RecordChange) -> StoreResult<MergeOutcome> {
    let Some(id) = record.id else {
        return Ok(MergeOutcome::skipped(format!(
            "{} delete without an id",
            record.kind.entity_type()
        )));
    };
    let table = record_table(record.kind);
    if !table_exists(conn, table)? {
        return Ok(MergeOutcome::skipped(format!("table {table} missing")));
    }

    match record.kind {
        RecordKind::Student => {
            let mut rows = delete_dependents(conn, &["points_log", "points_history"], "student_id", id)?;
            rows += conn.execute("DELETE FROM students WHERE id = ?1", params![id])?;
            Ok(MergeOutcome::Applied { rows })
        }
        RecordKind::Teacher => {
            let mut rows = delete_dependents(conn, &["teacher_classes"], "teacher_id", id)?;
            rows += conn.execute("DELETE FROM teachers WHERE id = ?1", params![id])?;
            Ok(MergeOutcome::Applied { rows })
        }
        RecordKind::Product => {
            if !table_columns(conn, table)?.iter().any(|c| c == "is_active") {
                return Ok(MergeOutcome::skipped("products has no is_active column"));
            }
            let rows = conn.execute("UPDATE products SET is_active = 0 WHERE id = ?1", params![id])?;
            Ok(MergeOutcome::Applied { rows })
        }
    }
}

fn delete_dependents(
    conn: &Connection,
    tables: &[&str],
    column: &str,
    id: i64,
) -> StoreResult<usize> {
    let mut rows = 0;
    for table in tables {
        if table_exists(conn, table)? {
            let sql = format!("DELETE FROM \"{table}\" WHERE \"{column}\" = ?1");
            rows += conn.execute(&sql, params![id])?;
        }
    }
    Ok(rows)
}

fn rename_class(conn: &Connection, old_name: &str, new_name: &str) -> StoreResult<MergeOutcome> {
    if old_name == new_name {
        return Ok(MergeOutcome::skipped("class name unchanged"));
    }
    let mut rows = 0;
    if table_exists(conn, "students")? {
        rows += conn.execute(
            "UPDATE students SET class_name = ?1 WHERE class_name = ?2",
            params![new_name, old_name],
        )?;
    }
    if table_exists(conn, "teacher_classes")? {
        // Teachers already linked to the new name keep a single row.
        rows += conn.execute(
            "UPDATE OR IGNORE teacher_classes SET class_name = ?1 WHERE class_name = ?2",
            params![new_name, old_name],
        )?;
        conn.execute(
            "DELETE FROM teacher_classes WHERE class_name = ?1",
            params![old_name],
        )?;
    }
    if table_exists(conn, "classes")? {
        rows += conn.execute(
            "UPDATE OR IGNORE classes SET name = ?1 WHERE name = ?2",
            params![new_name, old_name],
        )?;
        conn.execute("DELETE FROM classes WHERE name = ?1", params![old_name])?;
    }
    Ok(MergeOutcome::Applied { rows })
}

fn remove_class(conn: &Connection, name: &str) -> StoreResult<MergeOutcome> {
    let mut rows = 0;
    if table_exists(conn, "students")? {
        rows += conn.execute(
            "UPDATE students SET class_name = NULL WHERE class_name = ?1",
            params![name],
        )?;
    }
    // teacher_classes.class_name is NOT NULL, so links are removed.
    if table_exists(conn, "teacher_classes")? {
        rows += conn.execute(
            "DELETE FROM teacher_classes WHERE class_name = ?1",
            params![name],
        )?;
    }
    if table_exists(conn, "classes")? {
        rows += conn.execute("DELETE FROM classes WHERE name = ?1", params![name])?;
    }
    Ok(MergeOutcome::Applied { rows })
}

/// Parses the timestamp layouts seen on stations and the server.
///
/// Offsets are normalized to UTC; naive values are taken as-is.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    const LAYOUTS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Decides whether an incoming setting replaces the local one.
///
/// An unparsable timestamp on either side applies the change.
pub fn incoming_wins(incoming: Option<&str>, local: Option<&str>) -> bool {
    match (
        incoming.and_then(parse_timestamp),
        local.and_then(parse_timestamp),
    ) {
        (Some(incoming), Some(local)) => incoming >= local,
        _ => true,
    }
}

fn merge_setting(
    conn: &Connection,
    key: &str,
    value: Option<&str>,
    event_time: Option<&str>,
) -> StoreResult<MergeOutcome> {
    let columns = table_columns(conn, "settings")?;
    if columns.is_empty() {
        return Ok(MergeOutcome::skipped("table settings missing"));
    }
    let has_timestamp = columns.iter().any(|c| c == "updated_at");

    if has_timestamp {
        let local: Option<Option<String>> = conn
            .query_row(
                "SELECT updated_at FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(local) = local {
            if !incoming_wins(event_time, local.as_deref()) {
                return Ok(MergeOutcome::skipped(format!(
                    "local setting {key} is newer"
                )));
            }
        }
    }

    let rows = if has_timestamp {
        let stamp = event_time
            .and_then(parse_timestamp)
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string());
        conn.execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, COALESCE(?3, CURRENT_TIMESTAMP))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, stamp],
        )?
    } else {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?
    };
    Ok(MergeOutcome::Applied { rows })
}

fn replace_list_item(conn: &Connection, item: &ListItemChange) -> StoreResult<MergeOutcome> {
    let table = list_table(item.kind);
    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        return Ok(MergeOutcome::skipped(format!("table {table} missing")));
    }

    if item.action == ActionType::Delete {
        let sql = format!("DELETE FROM \"{table}\" WHERE id = ?1");
        let rows = conn.execute(&sql, params![item.id])?;
        return Ok(MergeOutcome::Applied { rows });
    }

    let mut fields = item.fields.clone();
    fields.insert("id".into(), item.id.into());
    let rows = insert_row(conn, table, &columns, &fields, true)?;
    Ok(MergeOutcome::Applied { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use schoolsync_protocol::WireEvent;
    use schoolsync_testkit::prelude::*;
    use serde_json::json;

    fn school() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_school_schema(&conn);
        conn
    }

    fn event(entity_type: &str, action: &str, entity_id: Option<&str>, payload: Value) -> RemoteChangeEvent {
        event_at(entity_type, action, entity_id, payload, None)
    }

    fn event_at(
        entity_type: &str,
        action: &str,
        entity_id: Option<&str>,
        payload: Value,
        created_at: Option<&str>,
    ) -> RemoteChangeEvent {
        RemoteChangeEvent::from_wire(WireEvent {
            id: Some(1),
            event_id: Some("evt-1".into()),
            entity_type: entity_type.into(),
            entity_id: entity_id.map(str::to_string),
            action_type: action.into(),
            payload: Some(payload),
            created_at: created_at.map(str::to_string),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn points_delta_is_added_to_local_balance() {
        let conn = school();
        insert_student(&conn, 1, "S1", "Dana", "Levi", None, 12);

        let outcome = apply_change(
            &conn,
            &event(
                "student_points",
                "update",
                Some("1"),
                json!({"old_points": 10, "new_points": 15, "reason": "quiz"}),
            ),
        )
        .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(student_points(&conn, 1), Some(17));
        let (old, new, delta, reason): (i64, i64, i64, String) = conn
            .query_row(
                "SELECT old_points, new_points, delta, reason FROM points_log WHERE student_id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!((old, new, delta), (12, 17, 5));
        assert_eq!(reason, "quiz");
    }

    #[test]
    fn points_for_unknown_student_are_skipped() {
        let conn = school();
        let outcome = apply_change(
            &conn,
            &event("student_points", "update", Some("9"), json!({"old_points": 1, "new_points": 2})),
        )
        .unwrap();
        assert!(matches!(outcome, MergeOutcome::Skipped { .. }));
        assert_eq!(count_rows(&conn, "points_log", None), 0);
    }

    #[test]
    fn out_of_range_points_are_skipped() {
        let conn = school();
        insert_student(&conn, 1, "S1", "Dana", "Levi", None, i64::MAX - 1);

        let overflowing_delta = apply_change(
            &conn,
            &event("student_points", "update", Some("1"), json!({"old_points": i64::MIN, "new_points": 1})),
        )
        .unwrap();
        assert!(matches!(overflowing_delta, MergeOutcome::Skipped { .. }));

        let overflowing_balance = apply_change(
            &conn,
            &event("student_points", "update", Some("1"), json!({"old_points": 0, "new_points": 5})),
        )
        .unwrap();
        assert!(matches!(overflowing_balance, MergeOutcome::Skipped { .. }));

        assert_eq!(student_points(&conn, 1), Some(i64::MAX - 1));
        assert_eq!(count_rows(&conn, "points_log", None), 0);
    }

    #[test]
    fn upsert_updates_only_present_fields() {
        let conn = school();
        insert_student(&conn, 3, "S3", "Noa", "Cohen", Some("A1"), 40);

        apply_change(&conn, &event("student", "update", Some("3"), json!({"first_name": "Noam"}))).unwrap();

        let (first, last): (String, String) = conn
            .query_row("SELECT first_name, last_name FROM students WHERE id = 3", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(first, "Noam");
        assert_eq!(last, "Cohen");
        assert_eq!(student_points(&conn, 3), Some(40));
    }

    #[test]
    fn upsert_inserts_new_records() {
        let conn = school();
        apply_change(
            &conn,
            &event(
                "teacher",
                "create",
                Some("5"),
                json!({"name": "Ruth", "card_number": "C-5", "unknown_column": 1}),
            ),
        )
        .unwrap();
        assert_eq!(count_rows(&conn, "teachers", Some("id = 5 AND name = 'Ruth'")), 1);
    }

    #[test]
    fn natural_key_match_keeps_local_id() {
        let conn = school();
        insert_teacher(&conn, 2, "Old Name", Some("CARD-9"));

        apply_change(
            &conn,
            &event("teacher", "update", Some("77"), json!({"name": "New Name", "card_number": "CARD-9"})),
        )
        .unwrap();

        assert_eq!(count_rows(&conn, "teachers", None), 1);
        assert_eq!(count_rows(&conn, "teachers", Some("id = 2 AND name = 'New Name'")), 1);
    }

    #[test]
    fn student_delete_removes_history() {
        let conn = school();
        insert_student(&conn, 4, "S4", "Tal", "Mor", None, 5);
        insert_points_history(&conn, 4, 5);
        conn.execute(
            "INSERT INTO points_log (student_id, old_points, new_points, delta) VALUES (4, 0, 5, 5)",
            [],
        )
        .unwrap();

        apply_change(&conn, &event("student", "delete", Some("4"), json!({}))).unwrap();

        assert_eq!(count_rows(&conn, "students", None), 0);
        assert_eq!(count_rows(&conn, "points_log", None), 0);
        assert_eq!(count_rows(&conn, "points_history", None), 0);
    }

    #[test]
    fn teacher_delete_removes_class_links() {
        let conn = school();
        insert_teacher(&conn, 1, "Ruth", None);
        insert_teacher_class(&conn, 1, "A1");

        apply_change(&conn, &event("teacher", "delete", Some("1"), json!({}))).unwrap();

        assert_eq!(count_rows(&conn, "teachers", None), 0);
        assert_eq!(count_rows(&conn, "teacher_classes", None), 0);
    }

    #[test]
    fn product_delete_is_soft() {
        let conn = school();
        insert_product(&conn, 8, "Pencil", 3);

        apply_change(&conn, &event("product", "delete", Some("8"), json!({}))).unwrap();

        assert_eq!(count_rows(&conn, "products", Some("id = 8 AND is_active = 0")), 1);
    }

    #[test]
    fn class_rename_updates_dependents() {
        let conn = school();
        insert_student(&conn, 1, "S1", "Dana", "Levi", Some("5A"), 0);
        insert_student(&conn, 2, "S2", "Noa", "Cohen", Some("5B"), 0);
        insert_teacher(&conn, 1, "Ruth", None);
        insert_teacher_class(&conn, 1, "5A");

        apply_change(
            &conn,
            &event("class", "update", None, json!({"old_name": "5A", "new_name": "6A"})),
        )
        .unwrap();

        assert_eq!(student_class(&conn, 1).as_deref(), Some("6A"));
        assert_eq!(student_class(&conn, 2).as_deref(), Some("5B"));
        assert_eq!(count_rows(&conn, "teacher_classes", Some("class_name = '6A'")), 1);
    }

    #[test]
    fn class_removal_clears_students_and_drops_links() {
        let conn = school();
        insert_student(&conn, 1, "S1", "Dana", "Levi", Some("5A"), 0);
        insert_teacher(&conn, 1, "Ruth", None);
        insert_teacher_class(&conn, 1, "5A");

        apply_change(&conn, &event("class", "delete", Some("5A"), json!({}))).unwrap();

        assert_eq!(student_class(&conn, 1), None);
        assert_eq!(count_rows(&conn, "students", None), 1);
        assert_eq!(count_rows(&conn, "teacher_classes", None), 0);
    }

    #[test]
    fn newer_setting_wins() {
        let conn = school();
        insert_setting(&conn, "theme", "light", "2024-01-01 10:00:00");

        let outcome = apply_change(
            &conn,
            &event_at(
                "setting",
                "update",
                Some("theme"),
                json!({"value": "dark"}),
                Some("2024-01-02T09:00:00Z"),
            ),
        )
        .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(setting_value(&conn, "theme").as_deref(), Some("dark"));
        let stamp: String = conn
            .query_row("SELECT updated_at FROM settings WHERE key = 'theme'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stamp, "2024-01-02 09:00:00");
    }

    #[test]
    fn older_setting_is_skipped() {
        let conn = school();
        insert_setting(&conn, "theme", "light", "2024-05-01 10:00:00");

        let outcome = apply_change(
            &conn,
            &event_at("setting", "update", Some("theme"), json!({"value": "dark"}), Some("2024-04-30 10:00:00")),
        )
        .unwrap();

        assert!(matches!(outcome, MergeOutcome::Skipped { .. }));
        assert_eq!(setting_value(&conn, "theme").as_deref(), Some("light"));
    }

    #[test]
    fn unparsable_setting_timestamp_applies() {
        let conn = school();
        insert_setting(&conn, "theme", "light", "yesterday-ish");

        apply_change(
            &conn,
            &event_at("setting", "update", Some("theme"), json!({"value": "dark"}), Some("2024-04-30 10:00:00")),
        )
        .unwrap();
        assert_eq!(setting_value(&conn, "theme").as_deref(), Some("dark"));
    }

    #[test]
    fn timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 08:30"), Some(expected));
        assert!(parse_timestamp("2024-03-01").is_some());
        assert_eq!(parse_timestamp("not a date"), None);
        assert!(incoming_wins(None, Some("2024-03-01")));
        assert!(incoming_wins(Some("2024-03-01 08:30:00"), Some("2024-03-01 08:30:00")));
    }

    #[test]
    fn list_items_are_replaced_and_deleted() {
        let conn = school();
        apply_change(
            &conn,
            &event(
                "message",
                "create",
                Some("31"),
                json!({"message_type": "info", "message_text": "hello", "is_active": 1}),
            ),
        )
        .unwrap();
        apply_change(
            &conn,
            &event("message", "update", Some("31"), json!({"message_type": "info", "message_text": "bye"})),
        )
        .unwrap();
        assert_eq!(count_rows(&conn, "messages", Some("id = 31 AND message_text = 'bye'")), 1);

        apply_change(&conn, &event("message", "delete", Some("31"), json!({}))).unwrap();
        assert_eq!(count_rows(&conn, "messages", None), 0);
    }

    #[test]
    fn incomplete_list_item_fails() {
        let conn = school();
        let result = apply_change(
            &conn,
            &event("message", "create", Some("1"), json!({"message_type": "info"})),
        );
        assert!(result.is_err());
    }

    #[test]
    fn unrecognized_changes_are_skipped() {
        let conn = school();
        let outcome = apply_change(&conn, &event("purchase", "create", Some("1"), json!({}))).unwrap();
        assert!(matches!(outcome, MergeOutcome::Skipped { .. }));
    }

    proptest! {
        #[test]
        fn deltas_commute(start in points_balance_strategy(), adjustments in points_adjustments_strategy()) {
            let forward = school();
            let backward = school();
            insert_student(&forward, 1, "S1", "A", "B", None, start);
            insert_student(&backward, 1, "S1", "A", "B", None, start);

            for (old, new) in &adjustments {
                apply_change(&forward, &event("student_points", "update", Some("1"), json!({"old_points": old, "new_points": new}))).unwrap();
            }
            for (old, new) in adjustments.iter().rev() {
                apply_change(&backward, &event("student_points", "update", Some("1"), json!({"old_points": old, "new_points": new}))).unwrap();
            }

            let expected = start + adjustments.iter().map(|(o, n)| n - o).sum::<i64>();
            prop_assert_eq!(student_points(&forward, 1), Some(expected));
            prop_assert_eq!(student_points(&backward, 1), Some(expected));
        }
    }
}
