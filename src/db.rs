use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::AppConfig;

/// Failure of a storage call, before it is mapped to an API error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Duplicate(String),
    #[error("storage call exceeded its {0:?} budget")]
    Timeout(Duration),
    #[error("database error")]
    Database(#[source] sqlx::Error),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let constraint = db.constraint().unwrap_or("unique").to_string();
                return StoreError::Duplicate(constraint);
            }
        }
        StoreError::Database(e)
    }
}

/// Time budget shared by every storage call made on behalf of one request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub async fn run<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(budget = ?self.budget, "storage call timed out");
                Err(StoreError::Timeout(self.budget))
            }
        }
    }
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not configured")?;
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.storage_timeout())
        .connect(url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("run migrations")?;

    Ok(pool)
}
