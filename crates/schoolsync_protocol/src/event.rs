//! Remote change events delivered by the pull endpoint.
//!
//! The server sends loosely typed rows (`entity_type` + `action_type` + a
//! JSON payload). They are decoded once, at the edge, into the closed
//! [`EntityChange`] enum so that every entity type has exactly one handler
//! on the applying side.

use crate::change::ActionType;
use crate::error::{ProtocolError, ProtocolResult};
use crate::policy::MergePolicy;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A change event exactly as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireEvent {
    /// Server-side sequence (the pull cursor position of this event).
    #[serde(default)]
    pub id: Option<i64>,
    /// Global idempotency key.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Station that produced the event (advisory).
    #[serde(default)]
    pub station_id: Option<String>,
    /// Entity type tag.
    #[serde(default)]
    pub entity_type: String,
    /// Identifier of the entity (servers send either numbers or strings).
    #[serde(default, deserialize_with = "lenient_id")]
    pub entity_id: Option<String>,
    /// Action tag.
    #[serde(default)]
    pub action_type: String,
    /// Structured payload.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Payload serialized as a JSON string (older servers).
    #[serde(default)]
    pub payload_json: Option<String>,
    /// Origin timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A decoded remote change event.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChangeEvent {
    /// Global idempotency key.
    pub event_id: String,
    /// Server-side sequence, when provided.
    pub sequence: Option<i64>,
    /// Station that produced the event, when reported.
    pub origin_station: Option<String>,
    /// Entity type tag as received.
    pub entity_type: String,
    /// Entity identifier as received.
    pub entity_id: Option<String>,
    /// Action tag as received.
    pub action_type: String,
    /// Origin timestamp (used by last-writer-wins entities).
    pub created_at: Option<String>,
    /// Typed change.
    pub change: EntityChange,
}

impl RemoteChangeEvent {
    /// Decodes a wire event.
    ///
    /// Fails only when the event carries no idempotency key at all. Unknown
    /// entity types and malformed payloads decode to
    /// [`EntityChange::Unrecognized`].
    pub fn from_wire(wire: WireEvent) -> ProtocolResult<Self> {
        let event_id = match (&wire.event_id, wire.id) {
            (Some(id), _) if !id.trim().is_empty() => id.trim().to_string(),
            (_, Some(seq)) => format!("seq:{seq}"),
            _ => {
                return Err(ProtocolError::invalid(
                    "event carries neither event_id nor id",
                ))
            }
        };

        let change = match resolve_payload(&wire) {
            Ok(payload) => EntityChange::decode(
                &wire.entity_type,
                &wire.action_type,
                wire.entity_id.as_deref(),
                &payload,
            ),
            Err(reason) => EntityChange::Unrecognized { reason },
        };

        Ok(Self {
            event_id,
            sequence: wire.id,
            origin_station: wire.station_id.filter(|s| !s.trim().is_empty()),
            entity_type: wire.entity_type,
            entity_id: wire.entity_id,
            action_type: wire.action_type,
            created_at: wire.created_at.filter(|s| !s.trim().is_empty()),
            change,
        })
    }

    /// Returns true if the event was produced by `station_id`.
    pub fn is_from_station(&self, station_id: &str) -> bool {
        self.origin_station.as_deref().map(str::trim) == Some(station_id.trim())
    }

    /// Returns the merge policy that applies to this event.
    pub fn policy(&self) -> MergePolicy {
        self.change.policy()
    }
}

fn resolve_payload(wire: &WireEvent) -> Result<Value, String> {
    match (&wire.payload, &wire.payload_json) {
        (Some(value), _) if !value.is_null() => Ok(value.clone()),
        (_, Some(text)) if !text.trim().is_empty() => serde_json::from_str(text)
            .map_err(|e| format!("payload_json is not valid JSON: {e}")),
        _ => Ok(Value::Object(Map::new())),
    }
}

/// Record-like entities upserted by primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A student (person-like, hard delete).
    Student,
    /// A teacher (person-like, hard delete).
    Teacher,
    /// A catalog product (soft delete).
    Product,
}

impl RecordKind {
    /// Canonical entity type tag.
    pub fn entity_type(&self) -> &'static str {
        match self {
            RecordKind::Student => "student",
            RecordKind::Teacher => "teacher",
            RecordKind::Product => "product",
        }
    }

    /// Returns true if deletes remove the row instead of deactivating it.
    pub fn is_person(&self) -> bool {
        matches!(self, RecordKind::Student | RecordKind::Teacher)
    }
}

/// Append-style content lists replaced row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Display messages.
    Message,
    /// News ticker entries.
    News,
    /// Advertisement entries.
    Ad,
}

impl ListKind {
    /// Canonical entity type tag.
    pub fn entity_type(&self) -> &'static str {
        match self {
            ListKind::Message => "message",
            ListKind::News => "news_item",
            ListKind::Ad => "ad_item",
        }
    }
}

/// A counter mutation captured at its origin as `(old, new)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsAdjustment {
    /// Student whose balance changed.
    pub student_id: i64,
    /// Balance before the change at the origin station.
    pub old_points: i64,
    /// Balance after the change at the origin station.
    pub new_points: i64,
    /// Free-text reason recorded at the origin.
    pub reason: Option<String>,
}

impl PointsAdjustment {
    /// The additive change carried by this event, `None` if it does not
    /// fit in an `i64`.
    pub fn delta(&self) -> Option<i64> {
        self.new_points.checked_sub(self.old_points)
    }
}

/// A full-record upsert or delete.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChange {
    /// Which record table.
    pub kind: RecordKind,
    /// Create/update/delete.
    pub action: ActionType,
    /// Primary key, when known.
    pub id: Option<i64>,
    /// Fields present in the payload.
    pub fields: Map<String, Value>,
}

/// A list row replacement or removal.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItemChange {
    /// Which list.
    pub kind: ListKind,
    /// Create/update/delete.
    pub action: ActionType,
    /// Row id.
    pub id: i64,
    /// Full row content (ignored for deletes).
    pub fields: Map<String, Value>,
}

/// Typed change, one variant per merge handler.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityChange {
    /// Counter mutation merged as a delta.
    PointsAdjusted(PointsAdjustment),
    /// Full record upsert/delete.
    Record(RecordChange),
    /// Grouping key renamed on every dependent record.
    ClassRenamed {
        /// Previous class name.
        old_name: String,
        /// New class name.
        new_name: String,
    },
    /// Grouping key cleared on every dependent record.
    ClassRemoved {
        /// Removed class name.
        name: String,
    },
    /// Scalar configuration value.
    SettingChanged {
        /// Setting key.
        key: String,
        /// New value (`None` stores NULL).
        value: Option<String>,
    },
    /// Content list row.
    ListItem(ListItemChange),
    /// Event that carries nothing applicable locally.
    Unrecognized {
        /// Why the event was not understood.
        reason: String,
    },
}

impl EntityChange {
    /// Decodes an entity change from its wire tags and payload.
    pub fn decode(
        entity_type: &str,
        action_type: &str,
        entity_id: Option<&str>,
        payload: &Value,
    ) -> Self {
        let tag = entity_type.trim().to_ascii_lowercase();
        let Some(action) = ActionType::parse(action_type) else {
            return unrecognized(format!("unknown action '{action_type}' for '{entity_type}'"));
        };

        match tag.as_str() {
            "student_points" | "points" => decode_points(entity_id, payload),
            "student" | "students" => decode_record(RecordKind::Student, action, entity_id, payload),
            "teacher" | "teachers" => decode_record(RecordKind::Teacher, action, entity_id, payload),
            "product" | "products" => decode_record(RecordKind::Product, action, entity_id, payload),
            "class" | "classes" | "class_name" => decode_class(action, entity_id, payload),
            "setting" | "settings" => decode_setting(action, entity_id, payload),
            "message" | "messages" => decode_list(ListKind::Message, action, entity_id, payload),
            "news" | "news_item" | "news_items" => {
                decode_list(ListKind::News, action, entity_id, payload)
            }
            "ad" | "ads" | "ad_item" | "ads_items" => {
                decode_list(ListKind::Ad, action, entity_id, payload)
            }
            _ => unrecognized(format!("no merge policy for entity type '{entity_type}'")),
        }
    }

    /// Returns the merge policy for this change.
    pub fn policy(&self) -> MergePolicy {
        match self {
            EntityChange::PointsAdjusted(_) => MergePolicy::DeltaMerge,
            EntityChange::Record(record) => match record.action {
                ActionType::Delete if record.kind.is_person() => MergePolicy::HardDelete,
                ActionType::Delete => MergePolicy::SoftDelete,
                _ => MergePolicy::Upsert,
            },
            EntityChange::ClassRenamed { .. } | EntityChange::ClassRemoved { .. } => {
                MergePolicy::BulkFieldUpdate
            }
            EntityChange::SettingChanged { .. } => MergePolicy::LastWriterWins,
            EntityChange::ListItem(_) => MergePolicy::ReplaceById,
            EntityChange::Unrecognized { .. } => MergePolicy::Ignore,
        }
    }
}

fn unrecognized(reason: String) -> EntityChange {
    EntityChange::Unrecognized { reason }
}

/// Reads an integer that may have been serialized as a number or a string.
fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn int_field(payload: &Value, names: &[&str]) -> Option<i64> {
    names
        .iter()
        .find_map(|name| payload.get(*name).and_then(int_value))
}

fn text_field(payload: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match payload.get(*name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn entity_int(entity_id: Option<&str>) -> Option<i64> {
    entity_id.and_then(|s| s.trim().parse().ok())
}

fn decode_points(entity_id: Option<&str>, payload: &Value) -> EntityChange {
    let student_id = entity_int(entity_id).or_else(|| int_field(payload, &["student_id"]));
    let old_points = int_field(payload, &["old_points", "old_value"]);
    let new_points = int_field(payload, &["new_points", "new_value"]);

    match (student_id, old_points, new_points) {
        (Some(student_id), Some(old_points), Some(new_points))
            if student_id > 0 && new_points.checked_sub(old_points).is_some() =>
        {
            EntityChange::PointsAdjusted(PointsAdjustment {
                student_id,
                old_points,
                new_points,
                reason: text_field(payload, &["reason"]),
            })
        }
        (None, _, _) => unrecognized("points event without a student id".into()),
        (Some(id), _, _) if id <= 0 => unrecognized(format!("invalid student id {id}")),
        (Some(_), Some(_), Some(_)) => unrecognized("delta out of range".into()),
        _ => unrecognized("points event without old/new values".into()),
    }
}

fn payload_fields(payload: &Value) -> Map<String, Value> {
    payload.as_object().cloned().unwrap_or_default()
}

fn decode_record(
    kind: RecordKind,
    action: ActionType,
    entity_id: Option<&str>,
    payload: &Value,
) -> EntityChange {
    let id = entity_int(entity_id).or_else(|| int_field(payload, &["id"]));
    EntityChange::Record(RecordChange {
        kind,
        action,
        id,
        fields: payload_fields(payload),
    })
}

fn decode_class(action: ActionType, entity_id: Option<&str>, payload: &Value) -> EntityChange {
    let fallback = entity_id.map(str::trim).filter(|s| !s.is_empty());
    match action {
        ActionType::Update => {
            let old_name = text_field(payload, &["old_name", "old_class", "old"])
                .or_else(|| fallback.map(str::to_string));
            let new_name = text_field(payload, &["new_name", "new_class", "new", "name"]);
            match (old_name, new_name) {
                (Some(old_name), Some(new_name)) => EntityChange::ClassRenamed { old_name, new_name },
                _ => unrecognized("class rename without old/new name".into()),
            }
        }
        ActionType::Delete => {
            match text_field(payload, &["name", "old_name", "class_name"])
                .or_else(|| fallback.map(str::to_string))
            {
                Some(name) => EntityChange::ClassRemoved { name },
                None => unrecognized("class delete without a name".into()),
            }
        }
        ActionType::Create => unrecognized("class create has no dependent records".into()),
    }
}

fn decode_setting(action: ActionType, entity_id: Option<&str>, payload: &Value) -> EntityChange {
    if action == ActionType::Delete {
        return unrecognized("settings are never deleted remotely".into());
    }
    let key = text_field(payload, &["key"]).or_else(|| {
        entity_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    });
    let Some(key) = key else {
        return unrecognized("setting event without a key".into());
    };
    let value = match payload.get("value") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };
    EntityChange::SettingChanged { key, value }
}

fn decode_list(
    kind: ListKind,
    action: ActionType,
    entity_id: Option<&str>,
    payload: &Value,
) -> EntityChange {
    match entity_int(entity_id).or_else(|| int_field(payload, &["id"])) {
        Some(id) => EntityChange::ListItem(ListItemChange {
            kind,
            action,
            id,
            fields: payload_fields(payload),
        }),
        None => unrecognized(format!("{} event without an id", kind.entity_type())),
    }
}
