use creditcore_domain_models::Tariff;
use sqlx::postgres::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::DbError;

pub struct TariffRepository {
    pool: PgPool,
}

impl TariffRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, tariff_id: Uuid) -> Result<Option<Tariff>, DbError> {
        let tariff = sqlx::query_as::<_, Tariff>("select * from tariffs where id = $1")
            .bind(tariff_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tariff)
    }

    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Tariff>, DbError> {
        let tariff = sqlx::query_as::<_, Tariff>("select * from tariffs where slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tariff)
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Tariff>, DbError> {
        let tariffs = sqlx::query_as::<_, Tariff>(
            "select * from tariffs where is_active order by sort_order asc",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tariffs)
    }
}
