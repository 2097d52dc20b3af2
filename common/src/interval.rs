// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, Utc};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Whole minutes between `start` and `end`, rounded down.
/// Negative when `end` precedes `start`.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().div_euclid(MILLIS_PER_MINUTE)
}

/// A session is kept only if it lasted at least one full minute.
pub fn is_valid_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    duration_minutes(start, end) >= 1
}

/// Minutes of `[entry_start, entry_end)` that fall inside
/// `[window_start, window_end)`.
///
/// An entry without an end (still running) overlaps nothing.
pub fn overlap_minutes(
    entry_start: DateTime<Utc>,
    entry_end: Option<DateTime<Utc>>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> i64 {
    let Some(entry_end) = entry_end else {
        return 0;
    };

    let overlap_start = entry_start.max(window_start);
    let overlap_end = entry_end.min(window_end);
    if overlap_end <= overlap_start {
        return 0;
    }

    duration_minutes(overlap_start, overlap_end).max(0)
}

/// Formats a number of minutes as `HH:MM`. Missing values print as `00:00`.
pub fn format_duration(minutes: Option<i64>) -> String {
    let minutes = minutes.unwrap_or(0).max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().to_utc()
    }

    #[test]
    fn test_duration_minutes() {
        assert_eq!(
            duration_minutes(at("2025-12-18T10:00:00Z"), at("2025-12-18T10:30:00Z")),
            30
        );
        assert_eq!(
            duration_minutes(at("2025-12-18T10:00:00Z"), at("2025-12-18T11:00:00Z")),
            60
        );
        // Sub-minute sessions floor to zero
        assert_eq!(
            duration_minutes(at("2025-12-18T10:00:00Z"), at("2025-12-18T10:00:45Z")),
            0
        );
    }

    #[test]
    fn test_duration_minutes_negative_floors_down() {
        assert_eq!(
            duration_minutes(at("2025-12-18T10:00:30Z"), at("2025-12-18T10:00:00Z")),
            -1
        );
        assert_eq!(
            duration_minutes(at("2025-12-18T11:00:00Z"), at("2025-12-18T10:00:00Z")),
            -60
        );
    }

    #[test]
    fn test_is_valid_duration_boundaries() {
        let start = at("2025-12-18T10:00:00Z");
        assert!(is_valid_duration(start, at("2025-12-18T10:01:00Z")));
        assert!(!is_valid_duration(start, at("2025-12-18T10:00:45Z")));
        assert!(!is_valid_duration(start, start));
        assert!(!is_valid_duration(start, at("2025-12-18T09:00:00Z")));
    }

    #[test]
    fn test_overlap_clips_entry_to_window() {
        let window_start = at("2026-01-15T04:00:00Z");
        let window_end = at("2026-01-16T04:00:00Z");

        // Starts before the window
        assert_eq!(
            overlap_minutes(
                at("2026-01-15T02:00:00Z"),
                Some(at("2026-01-15T06:00:00Z")),
                window_start,
                window_end
            ),
            120
        );

        // Spans the whole window
        assert_eq!(
            overlap_minutes(
                at("2026-01-15T00:00:00Z"),
                Some(at("2026-01-17T00:00:00Z")),
                window_start,
                window_end
            ),
            24 * 60
        );
    }

    #[test]
    fn test_overlap_outside_window_is_zero() {
        let window_start = at("2026-01-15T04:00:00Z");
        let window_end = at("2026-01-16T04:00:00Z");

        assert_eq!(
            overlap_minutes(
                at("2026-01-16T05:00:00Z"),
                Some(at("2026-01-16T06:00:00Z")),
                window_start,
                window_end
            ),
            0
        );
        // Touching the exclusive end
        assert_eq!(
            overlap_minutes(
                at("2026-01-16T04:00:00Z"),
                Some(at("2026-01-16T05:00:00Z")),
                window_start,
                window_end
            ),
            0
        );
        // Ending exactly at the start
        assert_eq!(
            overlap_minutes(
                at("2026-01-15T03:00:00Z"),
                Some(window_start),
                window_start,
                window_end
            ),
            0
        );
    }

    #[test]
    fn test_overlap_without_end_is_zero() {
        let window_start = at("2026-01-15T04:00:00Z");
        assert_eq!(
            overlap_minutes(
                at("2026-01-15T05:00:00Z"),
                None,
                window_start,
                window_start + Duration::hours(24)
            ),
            0
        );
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = (at("2026-01-15T08:00:00Z"), at("2026-01-15T12:30:00Z"));
        let b = (at("2026-01-15T10:15:00Z"), at("2026-01-15T18:00:00Z"));
        assert_eq!(
            overlap_minutes(a.0, Some(a.1), b.0, b.1),
            overlap_minutes(b.0, Some(b.1), a.0, a.1)
        );
    }

    #[test]
    fn test_overlap_of_identical_ranges_is_duration() {
        let start = at("2026-01-15T08:00:00Z");
        let end = at("2026-01-15T09:42:10Z");
        assert_eq!(
            overlap_minutes(start, Some(end), start, end),
            duration_minutes(start, end)
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(0)), "00:00");
        assert_eq!(format_duration(Some(30)), "00:30");
        assert_eq!(format_duration(Some(60)), "01:00");
        assert_eq!(format_duration(Some(90)), "01:30");
        assert_eq!(format_duration(Some(600)), "10:00");
        assert_eq!(format_duration(None), "00:00");
    }
}
