//! Conversion between JSON payload values and SQLite values.

use rusqlite::types::{Value as SqlValue, ValueRef};
use schoolsync_protocol::Row;
use serde_json::{Number, Value};

/// Converts a JSON value into a bindable SQLite value.
///
/// Booleans become 0/1, nested arrays and objects are stored as JSON text.
pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Converts a column value read from SQLite into JSON.
pub fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Reads the named columns of a result row into a JSON object.
pub fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (idx, name) in columns.iter().enumerate() {
        out.insert(name.clone(), sql_to_json(row.get_ref(idx)?));
    }
    Ok(out)
}

/// Keeps only the entries of `fields` whose key is a local column.
///
/// The result preserves the column declaration order so generated SQL is
/// stable for a given table.
pub fn filter_to_columns<'a>(
    fields: &'a serde_json::Map<String, Value>,
    columns: &[String],
) -> Vec<(&'a str, &'a Value)> {
    columns
        .iter()
        .filter_map(|col| fields.get_key_value(col.as_str()))
        .map(|(k, v)| (k.as_str(), v))
        .collect()
}
