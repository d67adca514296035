//! SQLite-backed stores for keywords, preferences and ingested content.
//!
//! One [`Database`] handle wraps a pooled connection and is cheap to clone.
//! The pool runs in WAL mode, so the dashboard can read while ingestion
//! writes.

pub mod content;
pub mod keywords;
pub mod preferences;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use monitor_core::{
    ContentItem, ContentSink, CoreError, DatabaseError, DatabaseSettings, InsertOutcome,
    KeywordSource,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, CoreError> {
        Self::connect_url(&settings.url, settings.max_connections).await
    }

    /// Opens (creating if missing) the database at `url`.
    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| connection_failed(url, e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| connection_failed(url, e))?;

        info!("Connected to database {}", url);
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Migration failed: {}", e);
                CoreError::Database(DatabaseError::MigrationFailed {
                    migration: e.to_string(),
                })
            })?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Connects and brings the schema up to date.
    pub async fn open(settings: &DatabaseSettings) -> Result<Self, CoreError> {
        let db = Self::connect(settings).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn connection_failed(url: &str, e: sqlx::Error) -> CoreError {
    error!("Failed to connect to database {}: {}", url, e);
    CoreError::Database(DatabaseError::ConnectionFailed {
        reason: e.to_string(),
    })
}

#[async_trait]
impl KeywordSource for Database {
    async fn active_keywords(&self) -> Result<Vec<String>, CoreError> {
        Database::active_keywords(self).await
    }
}

#[async_trait]
impl ContentSink for Database {
    async fn insert_content(&self, item: &ContentItem) -> Result<InsertOutcome, CoreError> {
        Database::insert_content(self, item).await
    }
}
