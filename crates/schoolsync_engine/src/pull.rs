//! Cursor-based pull stage.

use crate::applier::{apply_pull_batch, BatchReport};
use crate::error::SyncResult;
use crate::transport::SyncTransport;
use schoolsync_store::LocalStore;
use tracing::{debug, info};

/// Outcome of one pull stage, summed over its batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Batches fetched.
    pub batches: usize,
    /// Events received.
    pub received: usize,
    /// Events merged.
    pub applied: usize,
    /// Events already applied earlier.
    pub duplicates: usize,
    /// Own events ignored.
    pub echoes: usize,
    /// Events that changed nothing.
    pub skipped: usize,
    /// Cursor after the last batch.
    pub cursor: i64,
}

impl PullReport {
    fn absorb(&mut self, batch: &BatchReport) {
        self.batches += 1;
        self.received += batch.received;
        self.applied += batch.applied;
        self.duplicates += batch.duplicates;
        self.echoes += batch.echoes;
        self.skipped += batch.skipped;
        self.cursor = batch.cursor_after;
    }
}

/// Pulls and applies batches until the server runs dry.
///
/// Another batch is requested only while the previous one was full and
/// moved the cursor, up to `max_batches` per call.
pub fn pull_and_apply<T: SyncTransport + ?Sized>(
    store: &mut LocalStore,
    transport: &T,
    station_id: &str,
    batch_size: usize,
    max_batches: usize,
) -> SyncResult<PullReport> {
    let mut report = PullReport {
        cursor: store.pull_cursor()?,
        ..Default::default()
    };

    while report.batches < max_batches.max(1) {
        let since_id = store.pull_cursor()?;
        let response = transport.pull(since_id, batch_size)?;
        let full = response.items.len() >= batch_size;
        let batch = apply_pull_batch(store, &response, station_id)?;
        debug!(
            since_id,
            received = batch.received,
            applied = batch.applied,
            cursor = batch.cursor_after,
            "pull batch applied"
        );
        report.absorb(&batch);

        if !full || !batch.advanced() {
            break;
        }
    }

    if report.received > 0 {
        info!(
            batches = report.batches,
            received = report.received,
            applied = report.applied,
            duplicates = report.duplicates,
            skipped = report.skipped,
            cursor = report.cursor,
            "pull complete"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, RecordedRequest};
    use schoolsync_protocol::{PullResponse, RemoteChangeEvent, WireEvent};
    use schoolsync_testkit::prelude::*;

    fn decode(seq: i64) -> RemoteChangeEvent {
        let wire: WireEvent = serde_json::from_value(points_event(seq, 1, 0, 1)).unwrap();
        RemoteChangeEvent::from_wire(wire).unwrap()
    }

    fn store() -> LocalStore {
        let store = LocalStore::open_in_memory().unwrap();
        apply_school_schema(store.connection());
        insert_student(store.connection(), 1, "S1", "Dana", "Levi", None, 0);
        store
    }

    #[test]
    fn full_batches_trigger_another_request() {
        let mut store = store();
        let transport = MockTransport::new();
        transport.queue_pull(Ok(PullResponse::new(vec![decode(1), decode(2)], Some(2))));
        transport.queue_pull(Ok(PullResponse::new(vec![decode(3)], Some(3))));

        let report = pull_and_apply(&mut store, &transport, "me", 2, 20).unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(report.applied, 3);
        assert_eq!(report.cursor, 3);
        assert_eq!(student_points(store.connection(), 1), Some(3));

        let pulls: Vec<_> = transport.requests();
        assert_eq!(pulls[1], RecordedRequest::Pull { since_id: 2, limit: 2 });
    }

    #[test]
    fn batch_limit_caps_one_cycle() {
        let mut store = store();
        let transport = MockTransport::new();
        for seq in 1..=5 {
            transport.queue_pull(Ok(PullResponse::new(vec![decode(seq)], Some(seq))));
        }

        let report = pull_and_apply(&mut store, &transport, "me", 1, 3).unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(store.pull_cursor().unwrap(), 3);
    }

    #[test]
    fn stalled_cursor_stops_the_loop() {
        let mut store = store();
        let transport = MockTransport::new();
        transport.queue_pull(Ok(PullResponse::new(vec![decode(1)], Some(1))));
        transport.queue_pull(Ok(PullResponse::new(vec![decode(1)], Some(1))));

        let report = pull_and_apply(&mut store, &transport, "me", 1, 20).unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(student_points(store.connection(), 1), Some(1));
    }
}
