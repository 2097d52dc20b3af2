// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Start/stop timer.
//!
//! The running timer is not kept in memory: it is the time entry of the
//! logical day whose `end_time` is still NULL. Every transition runs in one
//! transaction so that closing the previous entry and opening the next one
//! are applied together.
use crate::database::{self, OpenEntry};
use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use common::clock::resolve_logical_date;
use common::interval::{duration_minutes, is_valid_duration};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Task not found")]
    TaskNotFound(i64),

    #[error("No active timer")]
    NoActiveTimer,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<sqlx::Error> for TimerError {
    fn from(err: sqlx::Error) -> Self {
        TimerError::Storage(err.into())
    }
}

/// The entry opened by [`start_timer`].
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StartedTimer {
    pub entry_id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ClosedEntry {
    pub id: i64,
    pub task_name: String,
    pub duration_minutes: i64,
}

/// What became of a stopped entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    /// Shorter than a minute, deleted.
    Discarded,
    Closed(ClosedEntry),
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RunningTimer {
    pub entry_id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    pub elapsed_minutes: i64,
}

/// Starts a timer on `task_id` at `now`, closing whatever was running on the
/// same logical day first.
pub async fn start_timer<Tz: TimeZone>(
    pool: &SqlitePool,
    task_id: i64,
    now: &DateTime<Tz>,
) -> Result<StartedTimer, TimerError> {
    let date = resolve_logical_date(now);
    let now = now.with_timezone(&Utc);

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let task = database::get_task(&mut *tx, task_id)
        .await?
        .ok_or(TimerError::TaskNotFound(task_id))?;

    for open in database::get_open_entries(&mut *tx, date).await? {
        debug!("Closing running entry {} before starting a new one", open.id);
        close(&mut *tx, &open, now).await?;
    }

    let entry_id = database::insert_open_entry(&mut *tx, task.id, date, now).await?;
    tx.commit().await.context("Failed to commit timer start")?;

    info!("Started timer {} on task '{}' for {}", entry_id, task.name, date);

    Ok(StartedTimer {
        entry_id,
        task_id: task.id,
        task_name: task.name,
        start_time: now,
    })
}

/// Stops the running timer of the logical day of `now`.
pub async fn end_timer<Tz: TimeZone>(
    pool: &SqlitePool,
    now: &DateTime<Tz>,
) -> Result<EndOutcome, TimerError> {
    let date = resolve_logical_date(now);
    let now = now.with_timezone(&Utc);

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let open = database::get_open_entries(&mut *tx, date).await?;
    let Some(latest) = open.first() else {
        return Err(TimerError::NoActiveTimer);
    };

    let outcome = close(&mut *tx, latest, now).await?;
    tx.commit().await.context("Failed to commit timer end")?;

    match &outcome {
        EndOutcome::Discarded => info!("Discarded entry {} shorter than a minute", latest.id),
        EndOutcome::Closed(entry) => info!(
            "Stopped timer {} after {} minutes",
            entry.id, entry.duration_minutes
        ),
    }

    Ok(outcome)
}

/// The running timer of the logical day of `now`, if any.
pub async fn current_timer<Tz: TimeZone>(
    pool: &SqlitePool,
    now: &DateTime<Tz>,
) -> Result<Option<RunningTimer>, TimerError> {
    let date = resolve_logical_date(now);
    let now = now.with_timezone(&Utc);

    let mut conn = pool.acquire().await?;
    let open = database::get_open_entries(&mut *conn, date).await?;

    Ok(open.into_iter().next().map(|entry| RunningTimer {
        entry_id: entry.id,
        task_id: entry.task_id,
        task_name: entry.task_name,
        start_time: entry.start_time,
        elapsed_minutes: duration_minutes(entry.start_time, now),
    }))
}

/// Ends `open` at `end`. Entries shorter than a minute are deleted.
async fn close(
    conn: &mut SqliteConnection,
    open: &OpenEntry,
    end: DateTime<Utc>,
) -> Result<EndOutcome, TimerError> {
    if !is_valid_duration(open.start_time, end) {
        database::delete_entry(conn, open.id).await?;
        return Ok(EndOutcome::Discarded);
    }

    let minutes = duration_minutes(open.start_time, end);
    database::close_entry(conn, open.id, end, minutes).await?;

    Ok(EndOutcome::Closed(ClosedEntry {
        id: open.id,
        task_name: open.task_name.clone(),
        duration_minutes: minutes,
    }))
}
