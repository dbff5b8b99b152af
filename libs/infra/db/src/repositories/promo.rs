use creditcore_domain_models::PromoCode;
use sqlx::postgres::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::DbError;

pub struct PromoRepository {
    pool: PgPool,
}

impl PromoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Promo codes are matched case-insensitively; callers pass whatever
    /// the user typed and this normalizes to the stored uppercase form.
    #[instrument(skip(self))]
    pub async fn get_by_code(&self, code: &str) -> Result<Option<PromoCode>, DbError> {
        let normalized = code.trim().to_uppercase();
        let promo = sqlx::query_as::<_, PromoCode>("select * from promo_codes where code = $1")
            .bind(normalized)
            .fetch_optional(&self.pool)
            .await?;
        Ok(promo)
    }

    #[instrument(skip(self))]
    pub async fn has_activation(&self, user_id: i64, tariff_id: Uuid) -> Result<bool, DbError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "select 1 from promo_activations where user_id = $1 and tariff_id = $2",
        )
        .bind(user_id)
        .bind(tariff_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Records the activation and bumps `uses_count` atomically. Called at
    /// invoice-creation time, ahead of payment confirmation — a code can be
    /// spent by an invoice that later expires unpaid, trading a little
    /// promo inventory for a much simpler invoice/promo relationship.
    #[instrument(skip(self))]
    pub async fn activate(
        &self,
        user_id: i64,
        tariff_id: Uuid,
        promo_id: Uuid,
        tokens_credited: i64,
        subscription_days_added: i32,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("update promo_codes set uses_count = uses_count + 1 where id = $1")
            .bind(promo_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            insert into promo_activations
                (user_id, tariff_id, promo_id, tokens_credited, subscription_days_added)
            values ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(tariff_id)
        .bind(promo_id)
        .bind(tokens_credited)
        .bind(subscription_days_added)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
