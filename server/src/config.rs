// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

const DEFAULT_PORT: u16 = 3001;
const DB_FILE_NAME: &str = "clockwise.db";
const APP_DIR_NAME: &str = "ClockWise";
const FALLBACK_DB_DIR: &str = "data";

/// Server settings, read from the environment:
/// - `CLOCKWISE_DATABASE_URL`: full sqlx URL, takes precedence over the directory.
/// - `CLOCKWISE_DB_DIR`: directory holding `clockwise.db`.
/// - `CLOCKWISE_PORT`: listening port (default 3001).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("CLOCKWISE_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid CLOCKWISE_PORT: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let database_url = match lookup("CLOCKWISE_DATABASE_URL") {
            Some(url) => url,
            None => {
                let dir = resolve_db_dir(lookup("CLOCKWISE_DB_DIR").map(PathBuf::from))?;
                format!("sqlite://{}", dir.join(DB_FILE_NAME).display())
            }
        };

        Ok(Self { database_url, port })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Picks the first usable directory: the configured one, the platform data
/// directory, then `./data`.
fn resolve_db_dir(configured: Option<PathBuf>) -> Result<PathBuf> {
    let candidates = configured
        .into_iter()
        .chain(dirs::data_dir().map(|d| d.join(APP_DIR_NAME)))
        .chain(std::iter::once(PathBuf::from(FALLBACK_DB_DIR)));

    first_usable_dir(candidates)
}

fn first_usable_dir(candidates: impl IntoIterator<Item = PathBuf>) -> Result<PathBuf> {
    for dir in candidates {
        match ensure_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) => warn!("Cannot use database directory {:?}: {:?}", dir, e),
        }
    }

    anyhow::bail!("Unable to find a writable directory for the database")
}

/// Creates `dir` if needed and checks that a file can be written into it.
fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;
    // Dropped (and removed) straight away.
    tempfile::Builder::new()
        .prefix(".clockwise-")
        .tempfile_in(dir)
        .with_context(|| format!("{dir:?} is not writable"))?;
    Ok(())
}
