//! Protocol messages for sync.

use crate::change::PushedChange;
use crate::error::{ProtocolError, ProtocolResult};
use crate::event::{RemoteChangeEvent, WireEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One table row in a snapshot (column name → value).
pub type Row = Map<String, Value>;

/// A full export: table name → rows.
pub type TableRows = BTreeMap<String, Vec<Row>>;

fn default_ok() -> bool {
    true
}

/// Batch of outbox entries uploaded to the push endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Tenant (school) identity.
    pub tenant_id: String,
    /// Station identity (advisory).
    pub station_id: String,
    /// Entries in ascending local id order.
    pub changes: Vec<PushedChange>,
}

impl PushRequest {
    /// Creates a new push request.
    pub fn new(
        tenant_id: impl Into<String>,
        station_id: impl Into<String>,
        changes: Vec<PushedChange>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            station_id: station_id.into(),
            changes,
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Highest local id in the batch.
    pub fn last_id(&self) -> Option<i64> {
        self.changes.iter().map(|c| c.id).max()
    }
}

/// Push endpoint reply. Only informative: any 2xx status acknowledges the
/// whole batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PushResponse {
    /// Number of changes the server received.
    #[serde(default)]
    pub received: Option<u64>,
    /// Number of changes the server applied.
    #[serde(default)]
    pub applied: Option<u64>,
    /// Number of changes the server failed to apply.
    #[serde(default)]
    pub errors: Option<u64>,
}

impl PushResponse {
    /// Decodes a reply body, returning `None` when it is not the expected
    /// JSON object.
    pub fn decode_lenient(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

#[derive(Debug, Deserialize)]
struct WirePullResponse {
    #[serde(default = "default_ok")]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    items: Vec<WireEvent>,
    #[serde(default)]
    next_since_id: Option<i64>,
}

/// Pull endpoint reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PullResponse {
    /// Events with id strictly greater than the requested cursor, in server
    /// order.
    pub items: Vec<RemoteChangeEvent>,
    /// Cursor to request next time.
    pub next_since_id: Option<i64>,
}

impl PullResponse {
    /// Creates a new pull response.
    pub fn new(items: Vec<RemoteChangeEvent>, next_since_id: Option<i64>) -> Self {
        Self {
            items,
            next_since_id,
        }
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let wire: WirePullResponse = serde_json::from_slice(bytes)?;
        if !wire.ok {
            return Err(ProtocolError::Rejected(
                wire.error.unwrap_or_else(|| "pull failed".into()),
            ));
        }
        let items = wire
            .items
            .into_iter()
            .map(RemoteChangeEvent::from_wire)
            .collect::<ProtocolResult<Vec<_>>>()?;
        Ok(Self {
            items,
            next_since_id: wire.next_since_id,
        })
    }

    /// Returns the cursor to persist after this batch, if it moves forward.
    ///
    /// Falls back to the highest event sequence when the server omitted
    /// `next_since_id`. A value at or below `current` is never returned.
    pub fn advanced_cursor(&self, current: i64) -> Option<i64> {
        let candidate = self
            .next_since_id
            .or_else(|| self.items.iter().filter_map(|e| e.sequence).max())?;
        (candidate > current).then_some(candidate)
    }
}

#[derive(Debug, Deserialize)]
struct WireSnapshotEnvelope {
    #[serde(default = "default_ok")]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    snapshot: Map<String, Value>,
    #[serde(default)]
    last_event_id: Option<i64>,
}

/// Full snapshot used for bootstrap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotResponse {
    /// Table name → rows.
    pub tables: TableRows,
    /// Highest event id already reflected in the snapshot.
    pub last_event_id: Option<i64>,
}

impl SnapshotResponse {
    /// Decodes from JSON.
    ///
    /// Accepts the `{ok, snapshot, last_event_id}` envelope as well as a bare
    /// table map. Table entries that are not lists and rows that are not
    /// objects are dropped.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(map) = value else {
            return Err(ProtocolError::invalid("snapshot is not a JSON object"));
        };

        let (raw_tables, last_event_id) = if map.contains_key("snapshot") {
            let envelope: WireSnapshotEnvelope = serde_json::from_value(Value::Object(map))?;
            if !envelope.ok {
                return Err(ProtocolError::Rejected(
                    envelope.error.unwrap_or_else(|| "snapshot failed".into()),
                ));
            }
            (envelope.snapshot, envelope.last_event_id)
        } else {
            (map, None)
        };

        let tables = raw_tables
            .into_iter()
            .filter_map(|(table, rows)| match rows {
                Value::Array(rows) => Some((
                    table,
                    rows.into_iter()
                        .filter_map(|row| match row {
                            Value::Object(row) => Some(row),
                            _ => None,
                        })
                        .collect(),
                )),
                _ => None,
            })
            .collect();

        Ok(Self {
            tables,
            last_event_id,
        })
    }

    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

/// One-directional full snapshot pushed to seed the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPushRequest {
    /// Tenant (school) identity.
    pub tenant_id: String,
    /// Station identity (advisory).
    pub station_id: String,
    /// All teacher rows.
    pub teachers: Vec<Row>,
    /// All student rows.
    pub students: Vec<Row>,
}

impl SnapshotPushRequest {
    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Local asset manifest sent to the diff endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileManifestRequest {
    /// Relative path (forward slashes) → content hash.
    pub manifest: BTreeMap<String, String>,
}

impl FileManifestRequest {
    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Paths the server is missing or holds with a different hash.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileDiffResponse {
    /// Relative paths to upload.
    #[serde(default)]
    pub missing: Vec<String>,
}

impl FileDiffResponse {
    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Server asset manifest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileListResponse {
    /// Relative path → content hash.
    #[serde(default)]
    pub manifest: BTreeMap<String, String>,
}

impl FileListResponse {
    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
