// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Recurring job definitions (§4.6): a descriptor plus a [`RecurrenceSchedule`]
//! that the recurring poller expands into concrete [`crate::job::Job`]
//! instances on each tick.
//!
//! Unlike [`crate::job::JobId`], a [`RecurringJobId`] is caller-supplied, not
//! generated — `scheduleRecurringly` is keyed on it so re-registering under
//! the same id updates the definition in place instead of creating a
//! duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cron::RecurrenceSchedule;
use crate::descriptor::JobDescriptor;

/// A caller-chosen identifier for a recurring job definition. Not generated
/// via [`crate::define_id!`] because it has no type prefix or random suffix
/// — it's whatever string the caller passed to `scheduleRecurringly`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurringJobId(String);

impl RecurringJobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecurringJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecurringJobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RecurringJobId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::borrow::Borrow<str> for RecurringJobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The stored definition of a recurring job: what to call, when, and under
/// what identity it should be merged if re-registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringJobDefinition {
    id: RecurringJobId,
    descriptor: JobDescriptor,
    #[serde(skip)]
    schedule: Option<RecurrenceSchedule>,
    cron_expression: String,
    timezone: String,
    /// The latest instant this definition has already materialized a job
    /// for, so the poller never double-fires a tick it already handled.
    /// Initialized to the registration instant, not the epoch — a
    /// definition registered today must never backfill every occurrence
    /// since `DateTime::MIN_UTC`.
    created_up_to: DateTime<Utc>,
}

impl RecurringJobDefinition {
    pub fn new(
        id: impl Into<RecurringJobId>,
        descriptor: JobDescriptor,
        schedule: RecurrenceSchedule,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            descriptor,
            cron_expression: schedule.expression().to_string(),
            timezone: schedule.timezone().to_string(),
            schedule: Some(schedule),
            created_up_to: now,
        }
    }

    pub fn id(&self) -> &RecurringJobId {
        &self.id
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn cron_expression(&self) -> &str {
        &self.cron_expression
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn created_up_to(&self) -> DateTime<Utc> {
        self.created_up_to
    }

    /// Rebuild the parsed [`RecurrenceSchedule`] after a round-trip through
    /// storage, where only `cron_expression`/`timezone` survive serialization.
    pub fn schedule(&self) -> Option<&RecurrenceSchedule> {
        self.schedule.as_ref()
    }

    pub fn rehydrate_schedule(&mut self, schedule: RecurrenceSchedule) {
        self.schedule = Some(schedule);
    }

    /// The single next fire time after `created_up_to`, materialized only if
    /// it falls within `lookahead` of `now` — a definition whose next fire is
    /// still far off is left untouched so the watermark doesn't run ahead of
    /// what the poller can actually act on (§4.6 steps 1-3).
    ///
    /// Returns `None` (watermark unchanged) if the schedule hasn't been
    /// rehydrated, or if the next fire is beyond `now + lookahead`.
    /// Otherwise advances the watermark to the fire time and returns it
    /// along with whether it's already due (`fire_at <= now`) — the tie-break
    /// case where the job should be created `Enqueued` directly rather than
    /// `Scheduled`.
    pub fn next_fire_to_materialize(
        &mut self,
        now: DateTime<Utc>,
        lookahead: chrono::Duration,
    ) -> Option<(DateTime<Utc>, bool)> {
        let schedule = self.schedule.as_ref()?;
        let fire_at = schedule.next_after(self.created_up_to)?;
        if fire_at > now + lookahead {
            return None;
        }
        self.created_up_to = fire_at;
        Some((fire_at, fire_at <= now))
    }
}

#[cfg(test)]
#[path = "recurring_tests.rs"]
mod tests;
