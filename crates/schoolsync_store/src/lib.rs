//! # SchoolSync Store
//!
//! Access helpers for the station's local SQLite database.
//!
//! The kiosk application owns the user-data schema (students, teachers,
//! catalog, settings, content lists). This crate owns only the sync
//! bookkeeping tables and the primitives the agent needs on top of them:
//!
//! - `change_log`: the outbox of local mutations awaiting upload
//! - `sync_state`: the pull cursor, bootstrap flag and station identity
//! - `applied_events`: the idempotency ledger for remote events
//!
//! ## Key Invariants
//!
//! - Outbox entries are read in ascending id order and only ever updated
//!   to set `synced_at`
//! - The pull cursor never decreases
//! - A remote event id is recorded at most once

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod ledger;
pub mod outbox;
pub mod schema;
pub mod snapshot;
pub mod state;
mod store;
pub mod table;
pub mod value;

pub use error::{StoreError, StoreResult};
pub use store::LocalStore;
