use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::AppError;

pub mod migrations;
pub mod models;
pub mod seed;

#[derive(Clone)]
pub struct Database {
    write_pool: SqlitePool,
    read_pool: SqlitePool,
    pub db_path: Option<PathBuf>,
}

impl Database {
    pub async fn new(data_dir: &Path, max_read_connections: u32) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(data_dir).await?;

        let db_path = data_dir.join("agent_platform.db");
        let base_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .pragma("temp_store", "MEMORY");

        let write_opts = base_options.clone();
        let read_opts = base_options;

        let (write_result, read_result) = tokio::join!(
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(write_opts),
            SqlitePoolOptions::new()
                .max_connections(max_read_connections.max(1))
                .min_connections(1)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(read_opts),
        );

        let write_pool = write_result?;
        let read_pool = read_result?;

        migrations::run_migrations(&write_pool).await?;

        Ok(Self {
            write_pool,
            read_pool,
            db_path: Some(db_path),
        })
    }

    /// Single-connection in-memory database. Reads and writes share the one
    /// connection because every in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        migrations::run_migrations(&pool).await?;

        Ok(Self {
            write_pool: pool.clone(),
            read_pool: pool,
            db_path: None,
        })
    }

    pub fn write_pool(&self) -> &SqlitePool {
        &self.write_pool
    }

    pub fn read_pool(&self) -> &SqlitePool {
        &self.read_pool
    }

    /// Run PRAGMA optimize before closing. Call this on app shutdown.
    pub async fn optimize(&self) {
        let _ = sqlx::query("PRAGMA optimize")
            .execute(&self.write_pool)
            .await;
        tracing::info!("Database PRAGMA optimize executed");
    }
}
