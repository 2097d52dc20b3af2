// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use common::{BUILTIN_PROJECT_NAME, DayWindow, Project, SummaryEntry, Task};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool, migrate::MigrateDatabase};
use tracing::{debug, info};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        is_builtin INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS task_projects (
        task_id INTEGER NOT NULL,
        project_id INTEGER NOT NULL,
        PRIMARY KEY (task_id, project_id),
        FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE,
        FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS time_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id INTEGER NOT NULL,
        date DATE NOT NULL,
        start_time DATETIME NOT NULL,
        end_time DATETIME,
        duration_minutes INTEGER,
        FOREIGN KEY (task_id) REFERENCES tasks(id),
        UNIQUE(task_id, date, start_time)
    );
"#;

/// Establishes the database connection pool.
/// If the database does not exist, it creates it, then makes sure the schema
/// and the builtin project are in place.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Creates the tables if needed and seeds the builtin "No Project".
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .context("Failed to create schema")?;

    sqlx::query("INSERT OR IGNORE INTO projects (name, is_builtin) VALUES (?, 1)")
        .bind(BUILTIN_PROJECT_NAME)
        .execute(pool)
        .await
        .context("Failed to seed the builtin project")?;

    info!("Schema is ready.");
    Ok(())
}

// --- Projects ---

/// All projects, builtin first, then by name.
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    sqlx::query_as::<_, Project>(
        "SELECT id, name, is_builtin FROM projects ORDER BY is_builtin DESC, name",
    )
    .fetch_all(pool)
    .await
    .context("Failed to retrieve projects from DB")
}

pub async fn get_project(pool: &SqlitePool, project_id: i64) -> Result<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT id, name, is_builtin FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to retrieve project with ID: {project_id}"))
}

pub async fn create_project(pool: &SqlitePool, name: &str) -> Result<Project> {
    let id = sqlx::query("INSERT INTO projects (name, is_builtin) VALUES (?, 0)")
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to insert project into DB")?
        .last_insert_rowid();

    debug!("Inserted project {} with ID {}", name, id);

    Ok(Project {
        id,
        name: name.to_string(),
        is_builtin: false,
    })
}

/// Renames a non-builtin project. Returns false if no such project exists.
pub async fn rename_project(pool: &SqlitePool, project_id: i64, name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE projects SET name = ? WHERE id = ? AND is_builtin = 0")
        .bind(name)
        .bind(project_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to rename project with ID: {project_id}"))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes a non-builtin project. Its task links go with it.
pub async fn delete_project(pool: &SqlitePool, project_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ? AND is_builtin = 0")
        .bind(project_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete project with ID: {project_id}"))?;

    info!(
        "Deleted {} rows for project ID: {}",
        result.rows_affected(),
        project_id
    );
    Ok(result.rows_affected() > 0)
}

// --- Tasks ---

pub async fn list_tasks(pool: &SqlitePool) -> Result<Vec<Task>> {
    sqlx::query_as::<_, Task>("SELECT id, name FROM tasks ORDER BY name")
        .fetch_all(pool)
        .await
        .context("Failed to retrieve tasks from DB")
}

pub async fn get_task<'e, E>(executor: E, task_id: i64) -> Result<Option<Task>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Task>("SELECT id, name FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(executor)
        .await
        .with_context(|| format!("Failed to retrieve task with ID: {task_id}"))
}

pub async fn create_task(pool: &SqlitePool, name: &str) -> Result<Task> {
    let id = sqlx::query("INSERT INTO tasks (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to insert task into DB")?
        .last_insert_rowid();

    debug!("Inserted task {} with ID {}", name, id);

    Ok(Task {
        id,
        name: name.to_string(),
    })
}

pub async fn rename_task(pool: &SqlitePool, task_id: i64, name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE tasks SET name = ? WHERE id = ?")
        .bind(name)
        .bind(task_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to rename task with ID: {task_id}"))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes a task together with its time entries and project links.
/// Returns false if no task with the given ID was found.
pub async fn delete_task(pool: &SqlitePool, task_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM time_entries WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete the task's time entries")?;

    sqlx::query("DELETE FROM task_projects WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete the task's project links")?;

    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to delete task with ID: {task_id}"))?;

    tx.commit().await.context("Failed to commit task deletion")?;

    info!("Deleted {} rows for task ID: {}", result.rows_affected(), task_id);
    Ok(result.rows_affected() > 0)
}

// --- Task / project links ---

pub async fn list_project_tasks(pool: &SqlitePool, project_id: i64) -> Result<Vec<Task>> {
    sqlx::query_as::<_, Task>(
        "SELECT t.id, t.name
         FROM tasks t
         JOIN task_projects tp ON t.id = tp.task_id
         WHERE tp.project_id = ?
         ORDER BY t.name",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to retrieve tasks of project {project_id}"))
}

/// Links a task to a project. Linking twice is a no-op.
pub async fn link_task_to_project(pool: &SqlitePool, task_id: i64, project_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO task_projects (task_id, project_id) VALUES (?, ?)")
        .bind(task_id)
        .bind(project_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to link task {task_id} to project {project_id}"))?;
    Ok(())
}

// --- Time entries ---

#[derive(sqlx::FromRow)]
struct SummaryRow {
    task_id: i64,
    task_name: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    project_ids: Option<String>,
}

impl From<SummaryRow> for SummaryEntry {
    fn from(row: SummaryRow) -> Self {
        SummaryEntry {
            task_id: row.task_id,
            task_name: row.task_name,
            start_time: row.start_time,
            end_time: row.end_time,
            project_ids: decode_project_ids(row.project_ids.as_deref()),
        }
    }
}

/// Decodes the comma-joined ids produced by `GROUP_CONCAT`.
fn decode_project_ids(raw: Option<&str>) -> Vec<i64> {
    raw.map(|s| {
        s.split(',')
            .filter_map(|id| id.trim().parse::<i64>().ok())
            .collect()
    })
    .unwrap_or_default()
}

/// Closed entries overlapping `window`, each with the ids of the projects its
/// task is linked to.
pub async fn get_summary_entries(pool: &SqlitePool, window: &DayWindow) -> Result<Vec<SummaryEntry>> {
    let rows = sqlx::query_as::<_, SummaryRow>(
        "SELECT te.task_id, te.start_time, te.end_time,
                t.name AS task_name,
                GROUP_CONCAT(tp.project_id) AS project_ids
         FROM time_entries te
         JOIN tasks t ON te.task_id = t.id
         LEFT JOIN task_projects tp ON t.id = tp.task_id
         WHERE te.start_time < ? AND te.end_time IS NOT NULL AND te.end_time > ?
         GROUP BY te.id",
    )
    .bind(window.end)
    .bind(window.start)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve time entries for the summary")?;

    Ok(rows.into_iter().map(SummaryEntry::from).collect())
}

/// One line of the timesheet export.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct TimesheetEntry {
    pub id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,

    // Computed after the query.
    #[sqlx(default)]
    pub overlap_minutes: i64,
}

/// Closed entries overlapping `window`, oldest first.
/// `overlap_minutes` is left at zero for the caller to fill in.
pub async fn get_timesheet_entries(pool: &SqlitePool, window: &DayWindow) -> Result<Vec<TimesheetEntry>> {
    sqlx::query_as::<_, TimesheetEntry>(
        "SELECT te.id, te.task_id, te.start_time, te.end_time, te.duration_minutes,
                t.name AS task_name
         FROM time_entries te
         JOIN tasks t ON te.task_id = t.id
         WHERE te.start_time < ? AND te.end_time IS NOT NULL AND te.end_time > ?
         ORDER BY te.start_time ASC",
    )
    .bind(window.end)
    .bind(window.start)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve timesheet entries")
}

/// An open entry joined with its task name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OpenEntry {
    pub id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
}

/// Open entries of `date`, most recently started first.
pub async fn get_open_entries(conn: &mut SqliteConnection, date: NaiveDate) -> Result<Vec<OpenEntry>> {
    sqlx::query_as::<_, OpenEntry>(
        "SELECT te.id, te.task_id, te.start_time, t.name AS task_name
         FROM time_entries te
         JOIN tasks t ON te.task_id = t.id
         WHERE te.date = ? AND te.end_time IS NULL
         ORDER BY te.start_time DESC",
    )
    .bind(date)
    .fetch_all(conn)
    .await
    .with_context(|| format!("Failed to retrieve open time entries for {date}"))
}

pub async fn insert_open_entry(
    conn: &mut SqliteConnection,
    task_id: i64,
    date: NaiveDate,
    start_time: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query("INSERT INTO time_entries (task_id, date, start_time) VALUES (?, ?, ?)")
        .bind(task_id)
        .bind(date)
        .bind(start_time)
        .execute(conn)
        .await
        .context("Failed to insert time entry into DB")?
        .last_insert_rowid();

    debug!("Opened time entry {} for task {} on {}", id, task_id, date);
    Ok(id)
}

pub async fn close_entry(
    conn: &mut SqliteConnection,
    entry_id: i64,
    end_time: DateTime<Utc>,
    duration_minutes: i64,
) -> Result<()> {
    sqlx::query("UPDATE time_entries SET end_time = ?, duration_minutes = ? WHERE id = ?")
        .bind(end_time)
        .bind(duration_minutes)
        .bind(entry_id)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to close time entry with ID: {entry_id}"))?;
    Ok(())
}

pub async fn delete_entry(conn: &mut SqliteConnection, entry_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM time_entries WHERE id = ?")
        .bind(entry_id)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to delete time entry with ID: {entry_id}"))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sqlx::sqlite::SqlitePoolOptions;

    /// Helper function to set up an in-memory SQLite database for testing.
    /// A single connection keeps every query on the same in-memory database.
    pub(crate) async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory SQLite");
        init_schema(&pool).await.expect("Failed to create schema");
        pool
    }

    fn window() -> DayWindow {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 4, 0, 0).unwrap();
        DayWindow {
            start,
            end: start + Duration::hours(24),
        }
    }

    async fn insert_closed_entry(pool: &SqlitePool, task_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) {
        let mut conn = pool.acquire().await.unwrap();
        let id = insert_open_entry(&mut *conn, task_id, start.date_naive(), start)
            .await
            .unwrap();
        close_entry(&mut *conn, id, end, (end - start).num_minutes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_schema_seeds_single_builtin_project() {
        let pool = setup_test_db().await;
        // Running it again must not duplicate the builtin project.
        init_schema(&pool).await.unwrap();

        let projects = list_projects(&pool).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, BUILTIN_PROJECT_NAME);
        assert!(projects[0].is_builtin);
    }

    #[tokio::test]
    async fn test_establish_connection_pool_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("clockwise.db").display());

        let pool = establish_connection_pool(&url).await.unwrap();
        assert!(dir.path().join("clockwise.db").exists());
        assert_eq!(list_projects(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_projects_order_builtin_first() {
        let pool = setup_test_db().await;
        create_project(&pool, "Zulu").await.unwrap();
        create_project(&pool, "Alpha").await.unwrap();

        let names: Vec<String> = list_projects(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["No Project", "Alpha", "Zulu"]);
    }

    #[tokio::test]
    async fn test_builtin_project_cannot_be_renamed_or_deleted() {
        let pool = setup_test_db().await;
        let builtin = list_projects(&pool).await.unwrap().remove(0);

        assert!(!rename_project(&pool, builtin.id, "Renamed").await.unwrap());
        assert!(!delete_project(&pool, builtin.id).await.unwrap());
        assert_eq!(
            get_project(&pool, builtin.id).await.unwrap().unwrap().name,
            BUILTIN_PROJECT_NAME
        );
    }

    #[tokio::test]
    async fn test_duplicate_task_name_is_rejected() {
        let pool = setup_test_db().await;
        create_task(&pool, "Write report").await.unwrap();

        let err = create_task(&pool, "Write report").await.unwrap_err();
        let db_err = err
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .expect("expected a database error");
        assert!(db_err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_link_is_idempotent_and_listed() {
        let pool = setup_test_db().await;
        let project = create_project(&pool, "Client A").await.unwrap();
        let task = create_task(&pool, "Design").await.unwrap();

        link_task_to_project(&pool, task.id, project.id).await.unwrap();
        link_task_to_project(&pool, task.id, project.id).await.unwrap();

        let tasks = list_project_tasks(&pool, project.id).await.unwrap();
        assert_eq!(tasks, vec![task]);
    }

    #[tokio::test]
    async fn test_delete_task_cascades() {
        let pool = setup_test_db().await;
        let project = create_project(&pool, "Client A").await.unwrap();
        let task = create_task(&pool, "Design").await.unwrap();
        link_task_to_project(&pool, task.id, project.id).await.unwrap();
        let start = window().start + Duration::hours(1);
        insert_closed_entry(&pool, task.id, start, start + Duration::minutes(30)).await;

        assert!(delete_task(&pool, task.id).await.unwrap());
        assert!(!delete_task(&pool, task.id).await.unwrap());

        assert!(list_project_tasks(&pool, project.id).await.unwrap().is_empty());
        assert!(get_summary_entries(&pool, &window()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_project_removes_links() {
        let pool = setup_test_db().await;
        let project = create_project(&pool, "Client A").await.unwrap();
        let task = create_task(&pool, "Design").await.unwrap();
        link_task_to_project(&pool, task.id, project.id).await.unwrap();

        assert!(delete_project(&pool, project.id).await.unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_projects")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_summary_entries_decode_project_ids() {
        let pool = setup_test_db().await;
        let a = create_project(&pool, "Client A").await.unwrap();
        let b = create_project(&pool, "Internal").await.unwrap();
        let linked = create_task(&pool, "Linked").await.unwrap();
        let unlinked = create_task(&pool, "Unlinked").await.unwrap();
        link_task_to_project(&pool, linked.id, a.id).await.unwrap();
        link_task_to_project(&pool, linked.id, b.id).await.unwrap();

        let start = window().start + Duration::hours(2);
        insert_closed_entry(&pool, linked.id, start, start + Duration::hours(1)).await;
        insert_closed_entry(&pool, unlinked.id, start + Duration::hours(2), start + Duration::hours(3)).await;
        // Outside the window
        insert_closed_entry(
            &pool,
            unlinked.id,
            window().end + Duration::hours(1),
            window().end + Duration::hours(2),
        )
        .await;

        let mut entries = get_summary_entries(&pool, &window()).await.unwrap();
        entries.sort_by_key(|e| e.task_id);
        assert_eq!(entries.len(), 2);

        let mut ids = entries[0].project_ids.clone();
        ids.sort();
        assert_eq!(ids, vec![a.id, b.id]);
        assert!(entries[1].project_ids.is_empty());
    }

    #[tokio::test]
    async fn test_timesheet_entries_ordered_by_start() {
        let pool = setup_test_db().await;
        let task = create_task(&pool, "Design").await.unwrap();
        let base = window().start;
        insert_closed_entry(&pool, task.id, base + Duration::hours(5), base + Duration::hours(6)).await;
        insert_closed_entry(&pool, task.id, base + Duration::hours(1), base + Duration::hours(2)).await;

        let entries = get_timesheet_entries(&pool, &window()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].start_time < entries[1].start_time);
        assert_eq!(entries[0].task_name, "Design");
        assert_eq!(entries[0].duration_minutes, Some(60));
        assert_eq!(entries[0].overlap_minutes, 0);
    }

    #[test]
    fn test_decode_project_ids() {
        assert_eq!(decode_project_ids(Some("2,3")), vec![2, 3]);
        assert_eq!(decode_project_ids(Some("7")), vec![7]);
        assert!(decode_project_ids(Some("")).is_empty());
        assert!(decode_project_ids(None).is_empty());
    }
}
