//! Local change-log entries and their push wire form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of mutation recorded for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Entity was created.
    Create,
    /// Entity was updated (includes renames of grouping keys).
    Update,
    /// Entity was deleted.
    Delete,
}

impl ActionType {
    /// Parses a wire action tag.
    ///
    /// Accepts the historical aliases `insert`/`upsert` (create) and
    /// `rename` (update).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "create" | "insert" | "upsert" => Some(ActionType::Create),
            "update" | "rename" => Some(ActionType::Update),
            "delete" | "remove" => Some(ActionType::Delete),
            _ => None,
        }
    }

    /// Returns the canonical wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local mutation about to be appended to the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChange {
    /// Entity type tag (e.g. `student_points`).
    pub entity_type: String,
    /// Identifier of the changed entity, if it has one.
    pub entity_id: Option<String>,
    /// Mutation kind.
    pub action_type: ActionType,
    /// Structured description of the change.
    pub payload: Value,
}

impl NewChange {
    /// Creates a new change description.
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: Option<String>,
        action_type: ActionType,
        payload: Value,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            action_type,
            payload,
        }
    }
}

/// One row of the local outbox.
///
/// Entries are immutable after creation except for `synced_at`, which is
/// set once the server acknowledged the batch containing the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    /// Monotonic local sequence.
    pub id: i64,
    /// Entity type tag.
    pub entity_type: String,
    /// Identifier of the changed entity.
    pub entity_id: Option<String>,
    /// Mutation kind as stored (kept verbatim so unknown tags survive).
    pub action_type: String,
    /// Structured payload.
    pub payload: Value,
    /// Local creation timestamp.
    pub created_at: String,
    /// Acknowledgement timestamp; `None` means pending.
    pub synced_at: Option<String>,
}

impl ChangeLogEntry {
    /// Returns true if the entry still awaits upload.
    pub fn is_pending(&self) -> bool {
        self.synced_at.is_none()
    }

    /// Converts the entry into its push wire form.
    pub fn to_wire(&self) -> PushedChange {
        PushedChange {
            id: self.id,
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            action_type: self.action_type.clone(),
            payload_json: self.payload.to_string(),
            created_at: Some(self.created_at.clone()),
        }
    }
}

/// Change-log entry as sent in a push batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushedChange {
    /// Local sequence (lets the server derive an idempotency key).
    pub id: i64,
    /// Entity type tag.
    pub entity_type: String,
    /// Identifier of the changed entity.
    pub entity_id: Option<String>,
    /// Mutation kind.
    pub action_type: String,
    /// Payload serialized as a JSON string.
    pub payload_json: String,
    /// Local creation timestamp.
    pub created_at: Option<String>,
}
