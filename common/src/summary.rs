// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Daily totals by task, by project and by task within each project.
use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::DayWindow;
use crate::interval::overlap_minutes;
use crate::Project;

/// A closed time entry joined with its task and the projects the task is
/// linked to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub task_id: i64,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub project_ids: Vec<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskTotal {
    pub id: i64,
    pub name: String,
    pub total_minutes: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProjectTotal {
    pub id: i64,
    pub name: String,
    pub total_minutes: i64,
    pub is_builtin: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskProjectTotal {
    pub project_id: i64,
    pub project_name: String,
    pub task_id: i64,
    pub task_name: String,
    pub total_minutes: i64,
    pub project_is_builtin: bool,
}

/// The three views of one day.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub by_task: Vec<TaskTotal>,
    pub by_project: Vec<ProjectTotal>,
    pub by_task_per_project: Vec<TaskProjectTotal>,
}

/// Builds the daily summary of `entries` clipped to `window`.
///
/// Only the minutes of an entry that fall inside the window are counted. A
/// task linked to several projects adds its full minutes to each of them;
/// tasks without links go to the builtin project. Any missing input yields an
/// empty summary.
pub fn build_daily_summary(
    entries: Option<&[SummaryEntry]>,
    projects: Option<&[Project]>,
    window: Option<&DayWindow>,
) -> DailySummary {
    let (Some(entries), Some(projects), Some(window)) = (entries, projects, window) else {
        return DailySummary::default();
    };

    let catalog: HashMap<i64, &Project> = projects.iter().map(|p| (p.id, p)).collect();
    let builtin_id = projects.iter().find(|p| p.is_builtin).map(|p| p.id);

    let mut by_task: Vec<TaskTotal> = Vec::new();
    let mut task_index: HashMap<i64, usize> = HashMap::new();
    let mut by_project: Vec<ProjectTotal> = Vec::new();
    let mut project_index: HashMap<i64, usize> = HashMap::new();
    let mut by_task_per_project: Vec<TaskProjectTotal> = Vec::new();
    let mut pair_index: HashMap<(i64, i64), usize> = HashMap::new();

    for entry in entries {
        let overlap = overlap_minutes(entry.start_time, entry.end_time, window.start, window.end);
        if overlap <= 0 {
            continue;
        }

        let slot = *task_index.entry(entry.task_id).or_insert_with(|| {
            by_task.push(TaskTotal {
                id: entry.task_id,
                name: entry.task_name.clone(),
                total_minutes: 0,
            });
            by_task.len() - 1
        });
        by_task[slot].total_minutes += overlap;

        let effective: Vec<i64> = if entry.project_ids.is_empty() {
            builtin_id.into_iter().collect()
        } else {
            entry.project_ids.clone()
        };

        for project_id in effective {
            // Links to projects outside the catalog are ignored.
            let Some(project) = catalog.get(&project_id) else {
                continue;
            };

            let slot = *project_index.entry(project.id).or_insert_with(|| {
                by_project.push(ProjectTotal {
                    id: project.id,
                    name: project.name.clone(),
                    total_minutes: 0,
                    is_builtin: project.is_builtin,
                });
                by_project.len() - 1
            });
            by_project[slot].total_minutes += overlap;

            let slot = *pair_index
                .entry((project.id, entry.task_id))
                .or_insert_with(|| {
                    by_task_per_project.push(TaskProjectTotal {
                        project_id: project.id,
                        project_name: project.name.clone(),
                        task_id: entry.task_id,
                        task_name: entry.task_name.clone(),
                        total_minutes: 0,
                        project_is_builtin: project.is_builtin,
                    });
                    by_task_per_project.len() - 1
                });
            by_task_per_project[slot].total_minutes += overlap;
        }
    }

    // `sort_by` is stable: equal totals keep their first-seen order.
    by_task.sort_by(|a, b| b.total_minutes.cmp(&a.total_minutes));

    by_project.sort_by(|a, b| {
        b.is_builtin
            .cmp(&a.is_builtin)
            .then_with(|| compare_names(&a.name, &b.name))
    });

    by_task_per_project.sort_by(|a, b| {
        b.project_is_builtin
            .cmp(&a.project_is_builtin)
            .then_with(|| compare_names(&a.project_name, &b.project_name))
            .then_with(|| b.total_minutes.cmp(&a.total_minutes))
    });

    DailySummary {
        by_task,
        by_project,
        by_task_per_project,
    }
}

/// Case-insensitive name order; names differing only by case fall back to
/// the byte order so the result is total.
///
/// Comparison is by code point after lowercasing, not locale collation:
/// accented letters sort after every ASCII letter.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
