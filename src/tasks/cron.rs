//! Cron Schedule
//!
//! Five-field cron expressions (`minute hour day-of-month month
//! day-of-week`) evaluated in UTC. Fields accept `*`, single values, ranges,
//! lists and `/step`. The aliases `@hourly`, `@daily`, `@weekly` and
//! `@monthly` are also understood.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::{CacheError, Result};

/// Upper bound on candidate days examined before giving up (e.g. `0 0 30 2 *`).
const MAX_DAYS_SCANNED: u32 = 366 * 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let expanded = match trimmed {
            "@hourly" => "0 * * * *",
            "@daily" | "@midnight" => "0 0 * * *",
            "@weekly" => "0 0 * * 0",
            "@monthly" => "0 0 1 * *",
            other => other,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let minutes = parse_field(fields[0], 0, 59).map_err(|e| invalid(expression, e))?;
        let hours = parse_field(fields[1], 0, 23).map_err(|e| invalid(expression, e))?;
        let days_of_month = parse_field(fields[2], 1, 31).map_err(|e| invalid(expression, e))?;
        let months = parse_field(fields[3], 1, 12).map_err(|e| invalid(expression, e))?;
        let mut days_of_week = parse_field(fields[4], 0, 7).map_err(|e| invalid(expression, e))?;

        // 7 is an alias for Sunday
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: trimmed.to_string(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: fields[2] != "*",
            dow_restricted: fields[4] != "*",
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`, at minute resolution.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after
            .with_second(0)?
            .with_nanosecond(0)?
            + ChronoDuration::minutes(1);

        let mut date = start.date_naive();
        let mut first_day = true;

        for _ in 0..MAX_DAYS_SCANNED {
            if self.matches_date(date) {
                let (from_hour, from_minute) = if first_day {
                    (start.hour(), start.minute())
                } else {
                    (0, 0)
                };
                if let Some((hour, minute)) = self.first_time_from(from_hour, from_minute) {
                    let naive = date.and_hms_opt(hour, minute, 0)?;
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            date = date.succ_opt()?;
            first_day = false;
        }
        None
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        if !has(self.months, date.month()) {
            return false;
        }
        let dom = has(self.days_of_month, date.day());
        let dow = has(self.days_of_week, date.weekday().num_days_from_sunday());

        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// Earliest `(hour, minute)` at or after the given time of day.
    fn first_time_from(&self, from_hour: u32, from_minute: u32) -> Option<(u32, u32)> {
        for hour in from_hour..24 {
            if !has(self.hours, hour) {
                continue;
            }
            let first_minute = if hour == from_hour { from_minute } else { 0 };
            if let Some(minute) = (first_minute..60).find(|&m| has(self.minutes, m)) {
                return Some((hour, minute));
            }
        }
        None
    }
}

impl FromStr for CronSchedule {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn has(bits: u64, value: u32) -> bool {
    bits & (1u64 << value) != 0
}

fn invalid(expression: &str, reason: String) -> CacheError {
    CacheError::InvalidConfiguration(format!("cron '{}': {}", expression, reason))
}

/// Parses one field into a bitset of allowed values.
fn parse_field(field: &str, min: u32, max: u32) -> std::result::Result<u64, String> {
    let mut bits = 0u64;

    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("bad step '{}'", step))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, min, max)?, parse_value(b, min, max)?)
        } else {
            let value = parse_value(range, min, max)?;
            // `5/15` runs from 5 to the end of the field
            if item.contains('/') {
                (value, max)
            } else {
                (value, value)
            }
        };

        if start > end {
            return Err(format!("range {}-{} is reversed", start, end));
        }
        for value in (start..=end).step_by(step as usize) {
            bits |= 1u64 << value;
        }
    }

    Ok(bits)
}

fn parse_value(raw: &str, min: u32, max: u32) -> std::result::Result<u32, String> {
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if value < min || value > max {
        return Err(format!("{} outside {}-{}", value, min, max));
    }
    Ok(value)
}
