//! Test fixtures and database helpers.
//!
//! Provides the kiosk's reference schema and convenience functions for
//! seeding and inspecting a station database.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name used for scratch station databases.
pub const DB_FILE_NAME: &str = "school_points.db";

/// User-data tables as created by the kiosk application.
pub const SCHOOL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    serial_number INTEGER,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    id_number TEXT,
    class_name TEXT,
    photo_number TEXT,
    card_number TEXT,
    points INTEGER DEFAULT 0,
    private_message TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS teachers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    card_number TEXT UNIQUE,
    card_number2 TEXT,
    card_number3 TEXT,
    is_admin INTEGER DEFAULT 0,
    can_edit_student_card INTEGER DEFAULT 1,
    can_edit_student_photo INTEGER DEFAULT 1,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS teacher_classes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    teacher_id INTEGER NOT NULL,
    class_name TEXT NOT NULL,
    UNIQUE(teacher_id, class_name)
);

CREATE TABLE IF NOT EXISTS points_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    old_points INTEGER NOT NULL,
    new_points INTEGER NOT NULL,
    delta INTEGER NOT NULL,
    reason TEXT,
    actor_name TEXT,
    action_type TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS points_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER,
    points_added INTEGER,
    reason TEXT,
    added_by TEXT,
    added_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    display_name TEXT,
    image_path TEXT,
    price_points INTEGER DEFAULT 0,
    stock_qty INTEGER,
    is_active INTEGER DEFAULT 1,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_type TEXT NOT NULL,
    message_text TEXT NOT NULL,
    points_threshold INTEGER,
    student_id INTEGER,
    is_active INTEGER DEFAULT 1,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS news_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT,
    is_active INTEGER DEFAULT 1,
    sort_order INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS ads_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    image_path TEXT,
    is_active INTEGER DEFAULT 1,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS card_validations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    card_number TEXT,
    validated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;

/// A scratch station database with automatic cleanup.
///
/// The database file carries [`SCHOOL_SCHEMA`] and lives in its own
/// temporary directory, which doubles as the asset root.
pub struct TestDatabase {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Creates a new file-based database with the reference schema.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(DB_FILE_NAME);
        let conn = Connection::open(&path).expect("Failed to create database file");
        apply_school_schema(&conn);
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the database file.
    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Opens an extra connection to the database.
    pub fn connect(&self) -> Connection {
        Connection::open(&self.path).expect("Failed to open database")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the reference kiosk tables on `conn`.
pub fn apply_school_schema(conn: &Connection) {
    conn.execute_batch(SCHOOL_SCHEMA)
        .expect("Failed to apply school schema");
}

/// Inserts a student row.
pub fn insert_student(
    conn: &Connection,
    id: i64,
    serial: &str,
    first_name: &str,
    last_name: &str,
    class_name: Option<&str>,
    points: i64,
) {
    conn.execute(
        "INSERT INTO students (id, serial_number, first_name, last_name, class_name, points)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, serial, first_name, last_name, class_name, points],
    )
    .expect("Failed to insert student");
}

/// Inserts a teacher row.
pub fn insert_teacher(conn: &Connection, id: i64, name: &str, card_number: Option<&str>) {
    conn.execute(
        "INSERT INTO teachers (id, name, card_number) VALUES (?1, ?2, ?3)",
        params![id, name, card_number],
    )
    .expect("Failed to insert teacher");
}

/// Links a teacher to a class.
pub fn insert_teacher_class(conn: &Connection, teacher_id: i64, class_name: &str) {
    conn.execute(
        "INSERT INTO teacher_classes (teacher_id, class_name) VALUES (?1, ?2)",
        params![teacher_id, class_name],
    )
    .expect("Failed to insert teacher class");
}

/// Inserts a product row.
pub fn insert_product(conn: &Connection, id: i64, name: &str, price_points: i64) {
    conn.execute(
        "INSERT INTO products (id, name, price_points) VALUES (?1, ?2, ?3)",
        params![id, name, price_points],
    )
    .expect("Failed to insert product");
}

/// Inserts a setting with an explicit `updated_at`.
pub fn insert_setting(conn: &Connection, key: &str, value: &str, updated_at: &str) {
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
        params![key, value, updated_at],
    )
    .expect("Failed to insert setting");
}

/// Inserts a points history row for a student.
pub fn insert_points_history(conn: &Connection, student_id: i64, points_added: i64) {
    conn.execute(
        "INSERT INTO points_history (student_id, points_added, reason) VALUES (?1, ?2, 'seed')",
        params![student_id, points_added],
    )
    .expect("Failed to insert points history");
}

/// Reads a student's points balance.
pub fn student_points(conn: &Connection, id: i64) -> Option<i64> {
    conn.query_row(
        "SELECT points FROM students WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
    .expect("Failed to query student points")
}

/// Reads a student's class.
pub fn student_class(conn: &Connection, id: i64) -> Option<String> {
    conn.query_row(
        "SELECT class_name FROM students WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
    .expect("Failed to query student class")
    .flatten()
}

/// Reads a setting value.
pub fn setting_value(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .expect("Failed to query setting")
    .flatten()
}

/// Counts rows in `table`, optionally filtered by a raw `WHERE` clause.
pub fn count_rows(conn: &Connection, table: &str, filter: Option<&str>) -> i64 {
    let sql = match filter {
        Some(filter) => format!("SELECT COUNT(*) FROM \"{table}\" WHERE {filter}"),
        None => format!("SELECT COUNT(*) FROM \"{table}\""),
    };
    conn.query_row(&sql, [], |row| row.get(0))
        .expect("Failed to count rows")
}
