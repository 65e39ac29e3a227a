//! Property-based test generators using proptest.
//!
//! Provides strategies for generating sync events and local state that
//! respect the invariants the merge handlers assume.

use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for a points balance as seen on a kiosk.
pub fn points_balance_strategy() -> impl Strategy<Value = i64> {
    -1_000i64..100_000
}

/// Strategy for an `(old, new)` points pair captured at an origin station.
pub fn points_pair_strategy() -> impl Strategy<Value = (i64, i64)> {
    (points_balance_strategy(), -500i64..500).prop_map(|(old, delta)| (old, old + delta))
}

/// Strategy for a short list of `(old, new)` adjustments to one student.
pub fn points_adjustments_strategy() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec(points_pair_strategy(), 1..8)
}

/// Strategy for a strictly increasing sequence of server event ids.
pub fn event_ids_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..50, 1..20).prop_map(|gaps| {
        gaps.into_iter()
            .scan(0i64, |acc, gap| {
                *acc += gap;
                Some(*acc)
            })
            .collect()
    })
}

/// Strategy for a cursor value.
pub fn cursor_strategy() -> impl Strategy<Value = i64> {
    0i64..1_000_000
}

/// Strategy for a class name.
pub fn class_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][0-9]{1,2}").expect("Invalid regex")
}

/// Builds a wire pull event carrying a points adjustment.
pub fn points_event(seq: i64, student_id: i64, old: i64, new: i64) -> Value {
    json!({
        "id": seq,
        "event_id": format!("evt-{seq}"),
        "entity_type": "student_points",
        "entity_id": student_id.to_string(),
        "action_type": "update",
        "payload": {"student_id": student_id, "old_points": old, "new_points": new},
        "created_at": "2024-03-01 08:00:00"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn event_ids_are_strictly_increasing(ids in event_ids_strategy()) {
            for pair in ids.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }

        #[test]
        fn class_names_are_short(name in class_name_strategy()) {
            prop_assert!(name.len() <= 3);
        }
    }

    #[test]
    fn points_event_shape() {
        let event = points_event(7, 3, 10, 15);
        assert_eq!(event["event_id"], "evt-7");
        assert_eq!(event["payload"]["new_points"], 15);
    }
}
