//! Snapshot bootstrap and manual seed push.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use schoolsync_protocol::{SnapshotPushRequest, SnapshotResponse};
use schoolsync_store::{snapshot, state, LocalStore};
use tracing::{info, warn};

/// Bootstrap settings.
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Ignore the bootstrap flag.
    pub force: bool,
    /// Prefer the gzip snapshot endpoint.
    pub compressed: bool,
    /// Extra tables never overwritten.
    pub excluded_tables: Vec<String>,
}

/// What a bootstrap attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// No snapshot was requested.
    NotNeeded {
        /// Why.
        reason: &'static str,
    },
    /// A snapshot replaced local tables.
    Applied {
        /// Tables replaced.
        tables: usize,
        /// Rows inserted.
        rows: usize,
        /// Cursor set from the snapshot.
        cursor: Option<i64>,
    },
}

/// Bootstraps a fresh station from a server snapshot.
///
/// Runs only when the station was never bootstrapped (or `force` is set)
/// and both anchor tables are empty, so local data is never overwritten.
pub fn maybe_bootstrap<T: SyncTransport + ?Sized>(
    store: &mut LocalStore,
    transport: &T,
    options: &BootstrapOptions,
) -> SyncResult<BootstrapOutcome> {
    if store.is_bootstrapped()? && !options.force {
        return Ok(BootstrapOutcome::NotNeeded {
            reason: "already bootstrapped",
        });
    }
    if !store.anchors_empty()? {
        info!("local students or teachers present, skipping snapshot bootstrap");
        return Ok(BootstrapOutcome::NotNeeded {
            reason: "local data present",
        });
    }
    bootstrap(store, transport, options)
}

/// Downloads and applies a snapshot unconditionally.
pub fn bootstrap<T: SyncTransport + ?Sized>(
    store: &mut LocalStore,
    transport: &T,
    options: &BootstrapOptions,
) -> SyncResult<BootstrapOutcome> {
    info!(compressed = options.compressed, "fetching snapshot");
    let response = fetch(transport, options.compressed)?;
    apply_snapshot(store, &response, &options.excluded_tables)
}

fn fetch<T: SyncTransport + ?Sized>(transport: &T, compressed: bool) -> SyncResult<SnapshotResponse> {
    match transport.fetch_snapshot(compressed) {
        Err(SyncError::Server { status: 404, .. }) if compressed => {
            warn!("compressed snapshot endpoint not found, falling back to plain snapshot");
            transport.fetch_snapshot(false)
        }
        other => other,
    }
}

/// Replaces local tables with a snapshot and records the bootstrap.
pub fn apply_snapshot(
    store: &mut LocalStore,
    response: &SnapshotResponse,
    excluded_tables: &[String],
) -> SyncResult<BootstrapOutcome> {
    let report = store.transaction(|tx| -> SyncResult<_> {
        let report = snapshot::replace_tables(tx, &response.tables, excluded_tables)?;
        match response.last_event_id {
            Some(id) => state::set(tx, state::PULL_CURSOR_KEY, &id.to_string())?,
            None => warn!("snapshot carries no last_event_id, keeping the pull cursor"),
        }
        state::mark_bootstrapped(tx)?;
        Ok(report)
    })?;

    info!(
        tables = report.replaced.len(),
        rows = report.total_rows(),
        skipped = report.skipped.len(),
        cursor = ?response.last_event_id,
        "snapshot bootstrap complete"
    );
    Ok(BootstrapOutcome::Applied {
        tables: report.replaced.len(),
        rows: report.total_rows(),
        cursor: response.last_event_id,
    })
}

/// Uploads local teachers and students to seed an empty tenant.
///
/// Returns the number of teachers and students sent.
pub fn push_full_snapshot<T: SyncTransport + ?Sized>(
    store: &LocalStore,
    transport: &T,
    tenant_id: &str,
    station_id: &str,
) -> SyncResult<(usize, usize)> {
    let (teachers, students) = store.export_seed()?;
    let counts = (teachers.len(), students.len());
    info!(teachers = counts.0, students = counts.1, "pushing seed snapshot");

    let request = SnapshotPushRequest {
        tenant_id: tenant_id.to_string(),
        station_id: station_id.to_string(),
        teachers,
        students,
    };
    transport.push_snapshot(&request)?;
    info!("seed snapshot accepted");
    Ok(counts)
}
