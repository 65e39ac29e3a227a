//! # SchoolSync Protocol
//!
//! Wire types for the station ⇄ cloud sync protocol.
//!
//! This crate provides:
//! - `ChangeLogEntry` and its push wire form (`PushedChange`)
//! - `RemoteChangeEvent` with a closed `EntityChange` enum per entity type
//! - Request/response messages for push, pull, snapshot and asset manifests
//! - JSON encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod error;
mod event;
mod messages;
mod policy;

pub use change::{ActionType, ChangeLogEntry, NewChange, PushedChange};
pub use error::{ProtocolError, ProtocolResult};
pub use event::{
    EntityChange, ListItemChange, ListKind, PointsAdjustment, RecordChange, RecordKind,
    RemoteChangeEvent, WireEvent,
};
pub use messages::{
    FileDiffResponse, FileListResponse, FileManifestRequest, PullResponse, PushRequest,
    PushResponse, Row, SnapshotPushRequest, SnapshotResponse, TableRows,
};
pub use policy::MergePolicy;
