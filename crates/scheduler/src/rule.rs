//! Cron normalization and timezone-aware next-fire computation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::ScheduleError;

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Source configs use standard 5-field cron: `min hour day-of-month month day-of-week`.
pub fn normalize_cron(pattern: &str) -> String {
    let trimmed = pattern.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6/7-field; the parser decides.
        trimmed.to_string()
    }
}

/// A parsed cron schedule evaluated in a specific timezone.
#[derive(Clone)]
pub struct CronRule {
    pattern: String,
    expression: String,
    timezone: Tz,
    schedule: Schedule,
}

impl CronRule {
    /// Parse `pattern` (5- or 6-field) in `timezone` (IANA name, empty = UTC).
    pub fn parse(pattern: &str, timezone: &str) -> Result<Self, ScheduleError> {
        let expression = normalize_cron(pattern);
        let schedule = Schedule::from_str(&expression).map_err(|source| ScheduleError::InvalidCron {
            pattern: pattern.to_string(),
            source,
        })?;

        let tz_name = timezone.trim();
        let timezone = if tz_name.is_empty() {
            Tz::UTC
        } else {
            tz_name
                .parse::<Tz>()
                .map_err(|_| ScheduleError::UnknownTimezone(tz_name.to_string()))?
        };

        let rule = Self {
            pattern: pattern.trim().to_string(),
            expression,
            timezone,
            schedule,
        };
        if rule.next_after(Utc::now()).is_none() {
            return Err(ScheduleError::NeverFires(rule.pattern));
        }
        Ok(rule)
    }

    /// The pattern as configured.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The 6-field expression handed to the cron parser.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|t| t.with_timezone(&Utc))
    }
}

impl fmt::Debug for CronRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronRule")
            .field("expression", &self.expression)
            .field("timezone", &self.timezone.name())
            .finish()
    }
}

impl fmt::Display for CronRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.pattern, self.timezone.name())
    }
}
