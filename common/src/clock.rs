// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Day-boundary clock.
//!
//! A logical day starts at [`DAY_BOUNDARY_HOUR`] local time instead of
//! midnight, so a late work session stays on the day it began.
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hour (local time) at which a new logical day begins.
pub const DAY_BOUNDARY_HOUR: u32 = 4;

/// Errors raised while resolving a day window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("Invalid date format: {0}")]
    InvalidDate(String),
}

/// Half-open time range `[start, end)` covering one logical day.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Returns the logical date of `now`, in the timezone `now` carries.
/// Before the boundary hour the moment still belongs to the previous day.
pub fn resolve_logical_date<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    let date = now.date_naive();
    if now.hour() < DAY_BOUNDARY_HOUR {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// True iff `s` is a `YYYY-MM-DD` string naming a real calendar date.
pub fn is_valid_date_string(s: &str) -> bool {
    parse_date_string(s).is_some()
}

fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 {
        return None;
    }
    let shape_ok = bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Day window for `date` in the system's local timezone, starting at the
/// default boundary hour.
pub fn window_for_date(date: &str) -> Result<DayWindow, DateError> {
    window_for_date_in(date, DAY_BOUNDARY_HOUR, &Local)
}

/// Day window for `date` in `tz`, starting at `boundary_hour:00:00.000`.
///
/// The window always spans exactly 24 hours. A boundary time that falls in a
/// DST gap is reported as an invalid date; an ambiguous one uses the earliest
/// instant.
pub fn window_for_date_in<Tz: TimeZone>(
    date: &str,
    boundary_hour: u32,
    tz: &Tz,
) -> Result<DayWindow, DateError> {
    let invalid = || DateError::InvalidDate(date.to_string());

    let day = parse_date_string(date).ok_or_else(invalid)?;
    let naive_start = day.and_hms_opt(boundary_hour, 0, 0).ok_or_else(invalid)?;
    let start = tz
        .from_local_datetime(&naive_start)
        .earliest()
        .ok_or_else(invalid)?
        .with_timezone(&Utc);

    Ok(DayWindow {
        start,
        end: start + Duration::hours(24),
    })
}

/// Resolves the day a report is requested for.
///
/// Without an explicit date the logical date of `now` is used. An explicit
/// date must be a valid `YYYY-MM-DD` string.
pub fn resolve_window(
    requested: Option<&str>,
    now: &DateTime<Local>,
) -> Result<(NaiveDate, DayWindow), DateError> {
    let date = match requested {
        Some(s) => parse_date_string(s).ok_or_else(|| DateError::InvalidDate(s.to_string()))?,
        None => resolve_logical_date(now),
    };
    let window = window_for_date(&date.format("%Y-%m-%d").to_string())?;
    Ok((date, window))
}
