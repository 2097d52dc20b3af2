// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod config;
pub mod database;
pub mod handlers;
pub mod routes;
pub mod timer;

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,

    // Held across a whole start/end transition so two requests cannot both
    // see the same open entry.
    pub timer_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            timer_lock: Arc::new(Mutex::new(())),
        }
    }
}
