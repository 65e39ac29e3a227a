//! # SchoolSync Engine
//!
//! Station-side sync agent for the SchoolPoints kiosk.
//!
//! This crate provides:
//! - Outbox push with batch-level acknowledgement
//! - Cursor-based pull with idempotent, transactional batch apply
//! - Per-entity merge policies (delta, upsert, delete, bulk rename,
//!   last-writer-wins, replace-by-id)
//! - Snapshot bootstrap for fresh stations and the manual seed push
//! - Image and sound asset reconciliation
//! - Instance lock, supervisor loop and failure backoff
//! - HTTP transport abstraction
//!
//! ## Architecture
//!
//! Each cycle runs **pull, then push, then assets**:
//! 1. Pull remote events after the stored cursor and apply each batch in
//!    one SQLite transaction together with the cursor update
//! 2. Push pending outbox entries; a 2xx reply marks exactly the sent
//!    entries synced
//! 3. Reconcile asset files when the asset interval has elapsed
//!
//! ## Key Invariants
//!
//! - The pull cursor only moves forward
//! - An event id is applied at most once
//! - A pull batch applies completely or not at all
//! - Local data is never replaced by a snapshot once anchors exist
//! - One agent per station database

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod assets;
mod bootstrap;
mod config;
mod error;
mod http;
mod lock;
mod merge;
mod pull;
mod push;
mod supervisor;
mod transport;

pub use applier::{apply_pull_batch, BatchReport};
pub use assets::{build_manifest, file_digest, reconcile_assets, safe_destination, AssetReport, Manifest};
pub use bootstrap::{
    apply_snapshot, bootstrap, maybe_bootstrap, push_full_snapshot, BootstrapOptions,
    BootstrapOutcome,
};
pub use config::{
    AssetConfig, Credentials, Endpoints, RetryConfig, SyncAgentConfig, Timeouts,
    DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL,
};
pub use error::{ErrorClass, SyncError, SyncResult};
pub use http::{
    HttpBody, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartFile,
    ReqwestClient,
};
pub use lock::InstanceLock;
pub use merge::{apply_change, incoming_wins, parse_timestamp, MergeOutcome};
pub use pull::{pull_and_apply, PullReport};
pub use push::{push_pending, summarize, PushReport};
pub use supervisor::{AgentState, CycleReport, Stage, SyncAgent, SyncStats};
pub use transport::{MockTransport, RecordedRequest, SyncTransport};
