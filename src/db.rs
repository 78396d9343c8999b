use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;
use crate::memory_store::MemoryStore;
use crate::pg_store::PgStore;
use crate::store::DocumentStore;

const SCHEMA: &str = include_str!("../migrations/0001_documents.sql");

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::info!("Document schema ensured");

        Ok(Self { pool })
    }
}

/// Opens the store named by `DATABASE_URL`.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if config.uses_memory_store() {
        tracing::warn!("Using in-memory document store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = Database::new(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connection pool established");
    Ok(Arc::new(PgStore::new(db.pool)))
}
