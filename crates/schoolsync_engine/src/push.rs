//! Outbox push stage.

use crate::error::SyncResult;
use crate::transport::SyncTransport;
use schoolsync_protocol::{ChangeLogEntry, PushRequest};
use schoolsync_store::LocalStore;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of one push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Entries sent.
    pub sent: usize,
    /// Entries marked synced afterwards.
    pub acknowledged: usize,
    /// Entries per entity type, most frequent first.
    pub by_entity: Vec<(String, usize)>,
}

/// Counts entries per entity type, most frequent first then by name.
pub fn summarize(entries: &[ChangeLogEntry]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.entity_type.as_str()).or_default() += 1;
    }
    let mut summary: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    summary
}

fn format_summary(summary: &[(String, usize)]) -> String {
    summary
        .iter()
        .map(|(name, count)| format!("{name}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Uploads up to `limit` pending outbox entries as one batch.
///
/// On any 2xx reply exactly the sent entries are marked synced. On failure
/// nothing is marked and the same entries are offered next cycle.
pub fn push_pending<T: SyncTransport + ?Sized>(
    store: &mut LocalStore,
    transport: &T,
    tenant_id: &str,
    station_id: &str,
    limit: usize,
) -> SyncResult<PushReport> {
    let pending = store.fetch_pending(limit)?;
    if pending.is_empty() {
        debug!("outbox empty");
        return Ok(PushReport::default());
    }

    let by_entity = summarize(&pending);
    info!(count = pending.len(), entities = %format_summary(&by_entity), "pushing changes");
    if let Some(last) = pending.last() {
        debug!(
            id = last.id,
            entity_type = %last.entity_type,
            entity_id = ?last.entity_id,
            action = %last.action_type,
            created_at = %last.created_at,
            "last pending change"
        );
    }

    let request = PushRequest::new(
        tenant_id,
        station_id,
        pending.iter().map(ChangeLogEntry::to_wire).collect(),
    );
    let response = transport.push(&request).map_err(|e| {
        warn!(count = pending.len(), error = %e, "push failed");
        e
    })?;

    let ids: Vec<i64> = pending.iter().map(|entry| entry.id).collect();
    let acknowledged = store.mark_synced(&ids)?;
    info!(
        sent = ids.len(),
        acknowledged,
        received = ?response.received,
        applied = ?response.applied,
        "push acknowledged"
    );

    Ok(PushReport {
        sent: ids.len(),
        acknowledged,
        by_entity,
    })
}
