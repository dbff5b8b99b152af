use crate::errors::DbError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

/// Thin wrapper around a [`PgPool`]. Repositories borrow the pool directly
/// rather than checking out connections themselves — sqlx pools are already
/// cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        if database_url.is_empty() {
            return Err(DbError::Connection("DATABASE_URL is empty".into()));
        }
        info!("connecting to postgres");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
