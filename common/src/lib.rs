// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod clock;
pub mod interval;
pub mod summary;

pub use clock::{DateError, DayWindow};
pub use summary::{DailySummary, ProjectTotal, SummaryEntry, TaskProjectTotal, TaskTotal};

/// Maximum length, in characters, of a task or project name.
pub const MAX_NAME_LEN: usize = 50;

/// Name of the builtin fallback project.
pub const BUILTIN_PROJECT_NAME: &str = "No Project";

#[allow(clippy::doc_overindented_list_items)]
/// Represents a task the user can track time against.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: Allows conversion to/from JSON.
/// - `sqlx::FromRow`: Allows `sqlx` to create a `Task` instance directly
///    from a database result row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub name: String,
}

/// A project tasks can be linked to.
/// Exactly one project is builtin ("No Project"); it collects the time of
/// tasks without any link.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub is_builtin: bool,
}

/// A single timer session as stored in the `time_entries` table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TimeEntry {
    pub id: i64,
    pub task_id: i64,

    // Logical date of the start, after the day-boundary adjustment.
    pub date: NaiveDate,

    pub start_time: DateTime<Utc>,

    // `None` while the timer is running.
    pub end_time: Option<DateTime<Utc>>,

    pub duration_minutes: Option<i64>,
}

/// Body of the task and project create/rename requests.
#[derive(Deserialize, Debug)]
pub struct NamePayload {
    pub name: String,
}

/// Body of `POST /api/timer/start`.
/// `task_id` is optional so that a missing id can be answered with a
/// validation error rather than a deserialization failure.
#[derive(Deserialize, Debug)]
pub struct StartTimerPayload {
    pub task_id: Option<i64>,
}

/// Trims a task or project name and checks it is 1 to 50 characters long.
/// Returns the trimmed name, or `None` when it is empty or too long.
pub fn normalize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return None;
    }
    Some(trimmed.to_string())
}
