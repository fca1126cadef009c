// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Cron-expression schedules for recurring jobs (§4.6).
//!
//! Expressions are parsed by the `cron` crate in its 6-field,
//! second-precision form (`sec min hour dom month dow`). A plain 5-field
//! expression is accepted too, with a leading `0` seconds field spliced in,
//! matching what most recurring-job call sites actually type.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule6;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronError {
    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),
}

/// A parsed cron expression paired with the timezone it should be evaluated
/// in. Two schedules with the same expression and timezone compare equal,
/// regardless of how the expression was spelled (`"* * * * *"` and
/// `"0 * * * * *"` are equivalent to the parser, so comparison is on the
/// normalized `cron::Schedule`, not the original string).
#[derive(Debug, Clone)]
pub struct RecurrenceSchedule {
    expression: String,
    timezone: Tz,
    parsed: CronSchedule6,
}

impl PartialEq for RecurrenceSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed && self.timezone == other.timezone
    }
}
impl Eq for RecurrenceSchedule {}

impl RecurrenceSchedule {
    /// Parse a 5- or 6-field cron expression against the given IANA timezone
    /// name (e.g. `"UTC"`, `"America/New_York"`).
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, CronError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| CronError::UnknownTimezone(timezone.to_string()))?;
        let normalized = normalize_to_six_fields(expression);
        let parsed = CronSchedule6::from_str(&normalized).map_err(|e| CronError::InvalidExpression {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { expression: expression.to_string(), timezone: tz, parsed })
    }

    pub fn utc(expression: &str) -> Result<Self, CronError> {
        Self::parse(expression, "UTC")
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The next fire time strictly after `after`, converted back to UTC.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.parsed.after(&local).next().map(|dt| dt.with_timezone(&Utc))
    }

    /// Every fire time strictly after `after` and at or before `until`,
    /// used by the recurring poller to catch up on a look-back window
    /// without re-running past instants already processed (§4.6).
    pub fn occurrences_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let local_after = after.with_timezone(&self.timezone);
        let local_until = until.with_timezone(&self.timezone);
        self.parsed
            .after(&local_after)
            .take_while(|dt| *dt <= local_until)
            .map(|dt| dt.with_timezone(&Utc))
            .collect()
    }
}

/// Splice a leading `0` seconds field onto a bare 5-field expression; leaves
/// 6-field (and malformed) expressions untouched for the parser to reject.
fn normalize_to_six_fields(expression: &str) -> String {
    let field_count = expression.split_whitespace().count();
    if field_count == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

/// Convenience builder mirroring the handful of shapes recurring jobs are
/// usually declared with.
pub struct RecurrenceBuilder;

impl RecurrenceBuilder {
    pub fn minutely() -> Result<RecurrenceSchedule, CronError> {
        RecurrenceSchedule::utc("* * * * *")
    }

    pub fn hourly() -> Result<RecurrenceSchedule, CronError> {
        RecurrenceSchedule::utc("0 * * * *")
    }

    /// Midnight UTC every day. For a specific time, use [`Self::daily_at`].
    pub fn daily() -> Result<RecurrenceSchedule, CronError> {
        Self::daily_at(0, 0)
    }

    pub fn daily_at(hour: u32, minute: u32) -> Result<RecurrenceSchedule, CronError> {
        RecurrenceSchedule::utc(&format!("{minute} {hour} * * *"))
    }

    /// Midnight UTC every Sunday. For a specific day/time, use [`Self::weekly_on`].
    pub fn weekly() -> Result<RecurrenceSchedule, CronError> {
        Self::weekly_on(chrono::Weekday::Sun, 0, 0)
    }

    pub fn weekly_on(weekday: chrono::Weekday, hour: u32, minute: u32) -> Result<RecurrenceSchedule, CronError> {
        // cron's day-of-week field is 0 (Sun) .. 6 (Sat); chrono's
        // `num_days_from_sunday` matches that directly.
        let dow = weekday.num_days_from_sunday();
        RecurrenceSchedule::utc(&format!("{minute} {hour} * * {dow}"))
    }

    /// Midnight UTC on the 1st of every month. For a specific day/time, use
    /// [`Self::monthly_on`].
    pub fn monthly() -> Result<RecurrenceSchedule, CronError> {
        Self::monthly_on(1, 0, 0)
    }

    pub fn monthly_on(day: u32, hour: u32, minute: u32) -> Result<RecurrenceSchedule, CronError> {
        RecurrenceSchedule::utc(&format!("{minute} {hour} {day} * *"))
    }

    /// Midnight UTC on January 1st every year. For a specific date/time, use
    /// [`Self::yearly_on`].
    pub fn yearly() -> Result<RecurrenceSchedule, CronError> {
        Self::yearly_on(1, 1, 0, 0)
    }

    pub fn yearly_on(month: u32, day: u32, hour: u32, minute: u32) -> Result<RecurrenceSchedule, CronError> {
        RecurrenceSchedule::utc(&format!("{minute} {hour} {day} {month} *"))
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
