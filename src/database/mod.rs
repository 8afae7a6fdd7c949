use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config;

/// Errors surfaced from the relational layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// True for failures the client caused (constraint violations), as
    /// opposed to connectivity or server-side faults.
    pub fn is_client_fault(&self) -> bool {
        match self {
            StoreError::Sqlx(sqlx::Error::Database(db)) => db.constraint().is_some(),
            _ => false,
        }
    }
}

/// Build the shared connection pool from `DATABASE_URL`, sized so each
/// request worker can hold one connection for its whole action.
pub async fn connect() -> Result<PgPool, StoreError> {
    let url =
        std::env::var("DATABASE_URL").map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;
    let settings = &config::config().database;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .connect(&url)
        .await?;
    info!("Connected database pool ({} connections max)", settings.max_connections);
    Ok(pool)
}

/// Ping the store.
pub async fn health_check(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
