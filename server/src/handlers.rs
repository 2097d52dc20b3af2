// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::timer::{self, EndOutcome, TimerError};
use crate::{AppState, database};
use axum::{
    extract::{
        FromRequest, FromRequestParts, Json, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Local;
use common::clock::{DateError, resolve_window};
use common::interval::overlap_minutes;
use common::summary::build_daily_summary;
use common::{NamePayload, Project, StartTimerPayload, Task, normalize_name};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info};

const PROJECT_NAME_INVALID: &str = "Project name must be 1-50 characters";
const TASK_NAME_INVALID: &str = "Task name must be 1-50 characters";

/// `?date=YYYY-MM-DD` on the report endpoints. Absent or empty means today.
#[derive(Deserialize, Debug, Default)]
pub struct DateQuery {
    pub date: Option<String>,
}

impl DateQuery {
    fn requested(&self) -> Option<&str> {
        self.date.as_deref().filter(|d| !d.is_empty())
    }
}

/// Request extractors whose rejections answer with the usual
/// `{"error": ...}` body instead of axum's plain text.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

// --- Projects ---

pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, AppError> {
    let projects = database::list_projects(&state.pool).await?;
    info!("Successfully retrieved {} projects.", projects.len());
    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NamePayload>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    debug!("Received request to create project: {}", payload.name);
    let name = normalize_name(&payload.name)
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, PROJECT_NAME_INVALID))?;

    let project = database::create_project(&state.pool, &name)
        .await
        .map_err(|e| duplicate_or_internal(e, "Project name already exists"))?;

    info!("Project created successfully with ID: {}", project.id);
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn rename_project(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<i64>,
    AppJson(payload): AppJson<NamePayload>,
) -> Result<Json<Project>, AppError> {
    let project = database::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Project not found"))?;

    if project.is_builtin {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Cannot rename built-in project",
        ));
    }

    let name = normalize_name(&payload.name)
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, PROJECT_NAME_INVALID))?;

    database::rename_project(&state.pool, project_id, &name)
        .await
        .map_err(|e| duplicate_or_internal(e, "Project name already exists"))?;

    info!("Project {} renamed to {}", project_id, name);
    Ok(Json(Project {
        id: project_id,
        name,
        is_builtin: false,
    }))
}

pub async fn delete_project(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    let project = database::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Project not found"))?;

    if project.is_builtin {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Cannot delete built-in project",
        ));
    }

    database::delete_project(&state.pool, project_id).await?;
    info!("Project with ID {} deleted successfully.", project_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_project_tasks(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<i64>,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = database::list_project_tasks(&state.pool, project_id).await?;
    Ok(Json(tasks))
}

pub async fn link_task(
    State(state): State<AppState>,
    AppPath((project_id, task_id)): AppPath<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    database::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Project not found"))?;
    database::get_task(&state.pool, task_id)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Task not found"))?;

    database::link_task_to_project(&state.pool, task_id, project_id).await?;
    info!("Linked task {} to project {}", task_id, project_id);
    Ok(StatusCode::NO_CONTENT)
}

// --- Tasks ---

pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = database::list_tasks(&state.pool).await?;
    info!("Successfully retrieved {} tasks.", tasks.len());
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NamePayload>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    debug!("Received request to create task: {}", payload.name);
    let name = normalize_name(&payload.name)
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, TASK_NAME_INVALID))?;

    let task = database::create_task(&state.pool, &name)
        .await
        .map_err(|e| duplicate_or_internal(e, "Task already exists"))?;

    info!("Task created successfully with ID: {}", task.id);
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn rename_task(
    State(state): State<AppState>,
    AppPath(task_id): AppPath<i64>,
    AppJson(payload): AppJson<NamePayload>,
) -> Result<Json<Task>, AppError> {
    database::get_task(&state.pool, task_id)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Task not found"))?;

    let name = normalize_name(&payload.name)
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, TASK_NAME_INVALID))?;

    database::rename_task(&state.pool, task_id, &name)
        .await
        .map_err(|e| duplicate_or_internal(e, "Task already exists"))?;

    Ok(Json(Task { id: task_id, name }))
}

pub async fn delete_task(
    State(state): State<AppState>,
    AppPath(task_id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    debug!("Attempting to delete task with ID: {}", task_id);

    // Deleting the running entry too; hold the timer lock meanwhile.
    let _guard = state.timer_lock.lock().await;
    if database::delete_task(&state.pool, task_id).await? {
        info!("Task with ID {} deleted successfully.", task_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        error!("Task with ID {} not found for deletion.", task_id);
        Err(AppError::new(StatusCode::NOT_FOUND, "Task not found"))
    }
}

// --- Timer ---

pub async fn current_timer(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let body = match timer::current_timer(&state.pool, &Local::now()).await? {
        Some(running) => json!({
            "active": true,
            "entry_id": running.entry_id,
            "task_id": running.task_id,
            "task_name": running.task_name,
            "start_time": running.start_time,
            "elapsed_minutes": running.elapsed_minutes,
        }),
        None => json!({ "active": false }),
    };
    Ok(Json(body))
}

pub async fn start_timer(
    State(state): State<AppState>,
    AppJson(payload): AppJson<StartTimerPayload>,
) -> Result<Json<Value>, AppError> {
    let task_id = payload
        .task_id
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "Task ID required"))?;

    let _guard = state.timer_lock.lock().await;
    let started = timer::start_timer(&state.pool, task_id, &Local::now()).await?;

    Ok(Json(json!({
        "active": true,
        "entry_id": started.entry_id,
        "task_id": started.task_id,
        "task_name": started.task_name,
        "start_time": started.start_time,
    })))
}

pub async fn end_timer(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let _guard = state.timer_lock.lock().await;
    let body = match timer::end_timer(&state.pool, &Local::now()).await? {
        EndOutcome::Discarded => json!({ "success": true, "discarded": true }),
        EndOutcome::Closed(entry) => json!({
            "success": true,
            "discarded": false,
            "entry": entry,
        }),
    };
    Ok(Json(body))
}

// --- Reports ---

/// Totals of one logical day: by task, by project and by task per project.
pub async fn totals(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let (date, window) = resolve_window(query.requested(), &Local::now())?;
    debug!("Building totals for {} ({} to {})", date, window.start, window.end);

    let entries = database::get_summary_entries(&state.pool, &window).await?;
    let projects = database::list_projects(&state.pool).await?;
    let summary = build_daily_summary(Some(&entries), Some(&projects), Some(&window));

    Ok(Json(json!({
        "byTask": summary.by_task,
        "byProject": summary.by_project,
        "byTaskPerProject": summary.by_task_per_project,
        "date": date,
    })))
}

/// Closed entries of one logical day with the minutes each spends inside it.
pub async fn timesheet_entries(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DateQuery>,
) -> Result<Json<Vec<database::TimesheetEntry>>, AppError> {
    let (_, window) = resolve_window(query.requested(), &Local::now())?;

    let mut entries = database::get_timesheet_entries(&state.pool, &window).await?;
    for entry in &mut entries {
        entry.overlap_minutes =
            overlap_minutes(entry.start_time, entry.end_time, window.start, window.end);
    }
    Ok(Json(entries))
}

// --- Custom Error Handling ---

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

/// Maps a UNIQUE constraint failure to a 400 with `message`; anything else
/// is an internal error.
fn duplicate_or_internal(err: anyhow::Error, message: &str) -> AppError {
    let is_duplicate = err
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation());

    if is_duplicate {
        AppError::new(StatusCode::BAD_REQUEST, message)
    } else {
        err.into()
    }
}

/// Allows converting an `anyhow::Error` (coming from `database.rs`)
/// into our `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the internal error for debugging.
        tracing::error!("Internal server error: {:?}", err);
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred.".to_string(),
        }
    }
}

impl From<TimerError> for AppError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::TaskNotFound(_) => Self::new(StatusCode::NOT_FOUND, "Task not found"),
            TimerError::NoActiveTimer => Self::new(StatusCode::BAD_REQUEST, "No active timer"),
            TimerError::Storage(e) => e.into(),
        }
    }
}

impl From<DateError> for AppError {
    fn from(err: DateError) -> Self {
        match err {
            DateError::InvalidDate(_) => Self::new(StatusCode::BAD_REQUEST, "Invalid date format"),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            "Responding with error: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
