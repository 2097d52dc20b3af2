// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};
use sqlx::SqlitePool;

/// Creates and configures the application router.
pub fn create_router(pool: SqlitePool) -> Router {
    Router::new()
        // Projects
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/api/projects/{id}",
            put(handlers::rename_project).delete(handlers::delete_project),
        )
        // Task / project links
        .route("/api/projects/{id}/tasks", get(handlers::list_project_tasks))
        .route(
            "/api/projects/{project_id}/tasks/{task_id}",
            post(handlers::link_task),
        )
        // Tasks
        .route(
            "/api/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/api/tasks/{id}",
            put(handlers::rename_task).delete(handlers::delete_task),
        )
        // Timer
        .route("/api/timer/current", get(handlers::current_timer))
        .route("/api/timer/start", post(handlers::start_timer))
        .route("/api/timer/end", post(handlers::end_timer))
        // Reports
        .route("/api/totals", get(handlers::totals))
        .route("/api/timesheet/entries", get(handlers::timesheet_entries))
        // Adds the shared state (DB pool and timer lock)
        .with_state(AppState::new(pool))
}
