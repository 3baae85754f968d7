use async_trait::async_trait;
use atrium_bootstrap::{AppContext, ConfigPrefix, Database};
use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

/// Connection settings for the SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(deserialize_with = "atrium_bootstrap::serde::non_empty")]
    url: String,
    max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://atrium.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl ConfigPrefix for DatabaseConfig {
    const PREFIX: &'static str = "database";
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            url: url.into(),
            max_connections,
        }
    }

    /// Private in-memory store on a single connection, mainly for tests.
    /// SQLite gives every connection its own in-memory database, so the
    /// pool must not grow past one.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
    "CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        body TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
];

/// SQLite-backed application store. The pool connects lazily; nothing
/// touches the file (or memory region) until the first query runs.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections())
            .connect_lazy(config.url())?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn create_all(&self, _ctx: &AppContext<'_>) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!(tables = SCHEMA.len(), "database schema ensured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_a_local_file() {
        let config = DatabaseConfig::default();
        assert!(config.url().starts_with("sqlite://"));
        assert_eq!(config.max_connections(), 5);
    }

    #[test]
    fn in_memory_config_is_single_connection() {
        let config = DatabaseConfig::in_memory();
        assert_eq!(config.url(), "sqlite::memory:");
        assert_eq!(config.max_connections(), 1);
    }
}
