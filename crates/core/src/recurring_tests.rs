// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

use super::*;
use crate::cron::RecurrenceBuilder;
use chrono::TimeZone;

fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
}

fn descriptor() -> JobDescriptor {
    JobDescriptor::new("reports.Nightly", "run").build()
}

#[test]
fn recurring_job_id_accepts_caller_supplied_strings() {
    let id = RecurringJobId::new("nightly-report");
    assert_eq!(id.as_str(), "nightly-report");
    assert_eq!(format!("{id}"), "nightly-report");
}

/// Drains every fire `next_fire_to_materialize` will report for `now` with
/// an effectively unbounded look-ahead, the way a test wants to observe "all
/// occurrences due by now" without modeling poller cadence.
fn drain_due(def: &mut RecurringJobDefinition, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let lookahead = chrono::Duration::days(365);
    let mut fired = Vec::new();
    while let Some((fire_at, due_now)) = def.next_fire_to_materialize(now, lookahead) {
        if !due_now {
            // Materialized as a future `Scheduled` fire; nothing more to
            // drain until `now` catches up to it.
            break;
        }
        fired.push(fire_at);
    }
    fired
}

#[test]
fn next_fire_to_materialize_advances_watermark_one_fire_at_a_time() {
    let schedule = RecurrenceBuilder::hourly().unwrap();
    let registered_at = at(2026, 1, 1, 0, 0, 0);
    let mut def = RecurringJobDefinition::new("hourly", descriptor(), schedule, registered_at);

    let first_check = at(2026, 1, 1, 2, 30, 0);
    let due = drain_due(&mut def, first_check);
    assert_eq!(due, vec![at(2026, 1, 1, 1, 0, 0), at(2026, 1, 1, 2, 0, 0)]);
    assert_eq!(def.created_up_to(), at(2026, 1, 1, 2, 0, 0));

    let second_check = at(2026, 1, 1, 3, 15, 0);
    let due = drain_due(&mut def, second_check);
    assert_eq!(due, vec![at(2026, 1, 1, 3, 0, 0)]);
}

#[test]
fn next_fire_to_materialize_reports_a_future_fire_as_not_due() {
    let schedule = RecurrenceBuilder::hourly().unwrap();
    let registered_at = at(2026, 1, 1, 0, 0, 0);
    let mut def = RecurringJobDefinition::new("hourly", descriptor(), schedule, registered_at);

    let (fire_at, due_now) = def.next_fire_to_materialize(registered_at, chrono::Duration::hours(2)).unwrap();
    assert_eq!(fire_at, at(2026, 1, 1, 1, 0, 0));
    assert!(!due_now);
    assert_eq!(def.created_up_to(), fire_at);
}

#[test]
fn next_fire_to_materialize_skips_a_fire_beyond_the_lookahead() {
    let schedule = RecurrenceBuilder::hourly().unwrap();
    let registered_at = at(2026, 1, 1, 0, 0, 0);
    let mut def = RecurringJobDefinition::new("hourly", descriptor(), schedule, registered_at);

    assert!(def
        .next_fire_to_materialize(registered_at, chrono::Duration::minutes(10))
        .is_none());
    assert_eq!(def.created_up_to(), registered_at, "watermark must not move when nothing was materialized");
}

#[test]
fn next_fire_to_materialize_is_none_without_a_rehydrated_schedule() {
    let schedule = RecurrenceBuilder::hourly().unwrap();
    let mut def = RecurringJobDefinition::new("hourly", descriptor(), schedule, at(2026, 1, 1, 0, 0, 0));
    def.schedule = None;
    assert!(def
        .next_fire_to_materialize(at(2026, 1, 1, 5, 0, 0), chrono::Duration::hours(1))
        .is_none());
}

#[test]
fn rehydrate_schedule_restores_expansion_after_round_trip() {
    let schedule = RecurrenceBuilder::daily_at(9, 0).unwrap();
    let mut def = RecurringJobDefinition::new("daily", descriptor(), schedule, at(2026, 2, 1, 10, 0, 0));
    def.schedule = None;
    def.rehydrate_schedule(RecurrenceBuilder::daily_at(9, 0).unwrap());
    let due = drain_due(&mut def, at(2026, 2, 2, 10, 0, 0));
    assert_eq!(due, vec![at(2026, 2, 2, 9, 0, 0)]);
}

mod proptest_no_duplicate_fires {
    use super::*;
    use proptest::prelude::*;

    /// §8 invariant 3: for any recurring definition, at most one job exists
    /// per fire instant across any observable window. Draining in several
    /// smaller ticks must expand to exactly the same, non-overlapping set
    /// of fire instants as one tick covering the whole span — regardless of
    /// how the span happens to get chopped up by however often the poller
    /// actually runs.
    proptest! {
        #[test]
        fn ticking_in_pieces_matches_one_tick_over_the_whole_span(
            total_minutes in 1i64..180,
            split_minutes in prop::collection::vec(1i64..20, 1..10),
        ) {
            let registered_at = at(2026, 1, 1, 0, 0, 0);
            let schedule = RecurrenceBuilder::minutely().unwrap();

            let mut whole = RecurringJobDefinition::new("whole", descriptor(), schedule.clone(), registered_at);
            let expected = drain_due(&mut whole, registered_at + chrono::Duration::minutes(total_minutes));

            let mut piecewise = RecurringJobDefinition::new("piecewise", descriptor(), schedule, registered_at);
            let mut elapsed = 0i64;
            let mut seen = Vec::new();
            for step in split_minutes {
                if elapsed >= total_minutes {
                    break;
                }
                elapsed = (elapsed + step).min(total_minutes);
                seen.extend(drain_due(&mut piecewise, registered_at + chrono::Duration::minutes(elapsed)));
            }
            if elapsed < total_minutes {
                seen.extend(drain_due(&mut piecewise, registered_at + chrono::Duration::minutes(total_minutes)));
            }

            // No instant fires twice across the piecewise ticks, and the
            // piecewise total is exactly the single-tick expansion.
            let mut dedup = seen.clone();
            dedup.sort();
            dedup.dedup();
            prop_assert_eq!(dedup.len(), seen.len(), "a fire instant was produced more than once");
            prop_assert_eq!(seen, expected);
        }
    }
}
