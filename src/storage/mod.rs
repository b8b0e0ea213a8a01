pub mod repository;

use std::path::{Path, PathBuf};

use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;\
                       PRAGMA foreign_keys=ON;\
                       PRAGMA busy_timeout=5000;";

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))])
}

/// Ticket queues and the project table in one SQLite file.
///
/// Writes go through `writer`; dashboard reads use `reader` so a long filter
/// never waits behind an insert (WAL).
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Database {
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| Error::Configuration("cannot determine data directory".into()))?;
        Ok(dir.join("supportdash").join("supportdash.db"))
    }

    /// Open (creating if needed) the store at [`Database::default_path`].
    pub async fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Configuration(format!("{}: {e}", dir.display())))?;
        }
        Self::open_at(path).await
    }

    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening store at {}", path.display());

        let writer = tokio_rusqlite::Connection::open(path).await?;
        Self::migrate(&writer).await?;
        let reader = tokio_rusqlite::Connection::open(path).await?;
        reader
            .call(|conn| conn.execute_batch(PRAGMAS))
            .await?;
        Ok(Self { writer, reader })
    }

    /// Fresh in-memory store. Reader and writer are one connection, since an
    /// in-memory database is private to its connection.
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::migrate(&conn).await?;
        Ok(Self {
            reader: conn.clone(),
            writer: conn,
        })
    }

    async fn migrate(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS).map_err(|e| e.to_string())?;
            migrations().to_latest(conn).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }
}
