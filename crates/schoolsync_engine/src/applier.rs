//! Transactional application of pulled event batches.

use crate::error::SyncResult;
use crate::merge::{apply_change, MergeOutcome};
use schoolsync_protocol::PullResponse;
use schoolsync_store::{ledger, state, LocalStore};
use tracing::{debug, warn};

/// What happened to one pull batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Events in the batch.
    pub received: usize,
    /// Events that wrote local state.
    pub applied: usize,
    /// Events already in the applied ledger.
    pub duplicates: usize,
    /// Events produced by this station.
    pub echoes: usize,
    /// Events understood but not applicable locally.
    pub skipped: usize,
    /// Cursor before the batch.
    pub cursor_before: i64,
    /// Cursor after the batch.
    pub cursor_after: i64,
}

impl BatchReport {
    /// Returns true if the batch moved the cursor.
    pub fn advanced(&self) -> bool {
        self.cursor_after > self.cursor_before
    }
}

/// Applies a pulled batch in one transaction.
///
/// Every event not yet in the ledger is merged and then recorded; events
/// produced by `station_id` are recorded without being merged. The cursor
/// moves inside the same transaction, so a failing event leaves both the
/// data and the cursor as they were.
pub fn apply_pull_batch(
    store: &mut LocalStore,
    response: &PullResponse,
    station_id: &str,
) -> SyncResult<BatchReport> {
    store.transaction(|tx| {
        let mut report = BatchReport {
            received: response.items.len(),
            cursor_before: state::pull_cursor(tx)?,
            ..Default::default()
        };

        for event in &response.items {
            if ledger::is_applied(tx, &event.event_id)? {
                report.duplicates += 1;
                continue;
            }

            if event.is_from_station(station_id) {
                debug!(event_id = %event.event_id, "skipping own event");
                report.echoes += 1;
            } else {
                let outcome = apply_change(tx, event).map_err(|e| {
                    warn!(
                        event_id = %event.event_id,
                        entity_type = %event.entity_type,
                        policy = %event.policy(),
                        error = %e,
                        "event failed to apply, rolling back batch"
                    );
                    e
                })?;
                match outcome {
                    MergeOutcome::Applied { rows } => {
                        debug!(event_id = %event.event_id, policy = %event.policy(), rows, "event applied");
                        report.applied += 1;
                    }
                    MergeOutcome::Skipped { reason } => {
                        warn!(event_id = %event.event_id, entity_type = %event.entity_type, %reason, "event skipped");
                        report.skipped += 1;
                    }
                }
            }

            ledger::record_applied(tx, &event.event_id)?;
        }

        report.cursor_after = match response.advanced_cursor(report.cursor_before) {
            Some(next) => {
                state::advance_pull_cursor(tx, next)?;
                next
            }
            None => report.cursor_before,
        };

        Ok(report)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schoolsync_protocol::{RemoteChangeEvent, WireEvent};
    use schoolsync_testkit::prelude::*;
    use serde_json::json;

    fn store() -> LocalStore {
        let store = LocalStore::open_in_memory().unwrap();
        apply_school_schema(store.connection());
        store
    }

    fn decode(value: serde_json::Value) -> RemoteChangeEvent {
        let wire: WireEvent = serde_json::from_value(value).unwrap();
        RemoteChangeEvent::from_wire(wire).unwrap()
    }

    #[test]
    fn batch_is_applied_once() {
        let mut store = store();
        insert_student(store.connection(), 1, "S1", "Dana", "Levi", None, 10);

        let response = PullResponse::new(vec![decode(points_event(5, 1, 0, 3))], Some(5));
        let first = apply_pull_batch(&mut store, &response, "me").unwrap();
        assert_eq!(first.applied, 1);
        assert_eq!(first.cursor_after, 5);
        assert!(first.advanced());

        let second = apply_pull_batch(&mut store, &response, "me").unwrap();
        assert_eq!(second.duplicates, 1);
        assert!(!second.advanced());
        assert_eq!(student_points(store.connection(), 1), Some(13));
    }

    #[test]
    fn own_events_are_recorded_but_not_merged() {
        let mut store = store();
        insert_student(store.connection(), 1, "S1", "Dana", "Levi", None, 10);

        let mut event = points_event(2, 1, 10, 20);
        event["station_id"] = json!("me");
        let response = PullResponse::new(vec![decode(event)], Some(2));

        let report = apply_pull_batch(&mut store, &response, "me").unwrap();
        assert_eq!(report.echoes, 1);
        assert_eq!(student_points(store.connection(), 1), Some(10));
        assert!(store.is_applied("evt-2").unwrap());
    }

    #[test]
    fn failing_event_rolls_back_everything() {
        let mut store = store();
        insert_student(store.connection(), 1, "S1", "Dana", "Levi", None, 10);

        let broken = json!({
            "id": 3, "event_id": "evt-3", "entity_type": "message", "entity_id": 4,
            "action_type": "create", "payload": {"message_type": "info"}
        });
        let response = PullResponse::new(
            vec![
                decode(points_event(1, 1, 0, 5)),
                decode(points_event(2, 1, 0, 5)),
                decode(broken),
                decode(points_event(4, 1, 0, 5)),
                decode(points_event(5, 1, 0, 5)),
            ],
            Some(5),
        );

        assert!(apply_pull_batch(&mut store, &response, "me").is_err());
        assert_eq!(student_points(store.connection(), 1), Some(10));
        assert_eq!(store.pull_cursor().unwrap(), 0);
        for seq in 1..=5 {
            assert!(!store.is_applied(&format!("evt-{seq}")).unwrap());
        }
    }

    #[test]
    fn out_of_range_points_do_not_abort_the_batch() {
        let mut store = store();
        insert_student(store.connection(), 1, "S1", "Dana", "Levi", None, 10);

        let response = PullResponse::new(
            vec![
                decode(points_event(1, 1, i64::MIN, 1)),
                decode(points_event(2, 1, 0, 5)),
            ],
            Some(2),
        );

        let report = apply_pull_batch(&mut store, &response, "me").unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(student_points(store.connection(), 1), Some(15));
        assert_eq!(store.pull_cursor().unwrap(), 2);
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let mut store = store();
        apply_pull_batch(&mut store, &PullResponse::new(Vec::new(), Some(40)), "me").unwrap();
        let report = apply_pull_batch(&mut store, &PullResponse::new(Vec::new(), Some(12)), "me").unwrap();
        assert_eq!(report.cursor_after, 40);
        assert_eq!(store.pull_cursor().unwrap(), 40);
    }
}
