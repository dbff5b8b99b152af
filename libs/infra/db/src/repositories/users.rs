use chrono::{DateTime, Utc};
use creditcore_domain_models::User;
use sqlx::postgres::PgPool;
use tracing::instrument;

use crate::errors::DbError;

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, user_id: i64) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>("select * from users where id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Upserts a user on first contact from the chat channel, refreshing
    /// the display name and username every call.
    #[instrument(skip(self, display_name, username))]
    pub async fn upsert_seen(
        &self,
        user_id: i64,
        display_name: Option<&str>,
        username: Option<&str>,
    ) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            insert into users (id, display_name, username)
            values ($1, $2, $3)
            on conflict (id) do update
            set display_name = excluded.display_name,
                username = excluded.username,
                updated_at = now()
            returning *
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn set_blocked(&self, user_id: i64, is_blocked: bool) -> Result<(), DbError> {
        sqlx::query("update users set is_blocked = $2, updated_at = now() where id = $1")
            .bind(user_id)
            .bind(is_blocked)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_auto_renew(&self, user_id: i64, auto_renew: bool) -> Result<(), DbError> {
        sqlx::query("update users set auto_renew = $2, updated_at = now() where id = $1")
            .bind(user_id)
            .bind(auto_renew)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_subscription_end(
        &self,
        user_id: i64,
        subscription_end: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        sqlx::query("update users set subscription_end = $2, updated_at = now() where id = $1")
            .bind(user_id)
            .bind(subscription_end)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records the smallest subscription-expiry bucket already notified;
    /// `None` resets the cycle once the subscription renews.
    #[instrument(skip(self))]
    pub async fn set_subscription_notification(
        &self,
        user_id: i64,
        bucket: Option<i32>,
    ) -> Result<(), DbError> {
        sqlx::query("update users set last_subscription_notification = $2 where id = $1")
            .bind(user_id)
            .bind(bucket)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_balance_notification(&self, user_id: i64, threshold: Option<i32>) -> Result<(), DbError> {
        sqlx::query("update users set last_balance_notification = $2 where id = $1")
            .bind(user_id)
            .bind(threshold)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Users whose subscription crosses one of the notification windows:
    /// still active, but inside `max_bucket_days` of expiring.
    #[instrument(skip(self))]
    pub async fn list_subscriptions_ending_within(
        &self,
        now: DateTime<Utc>,
        max_bucket_days: i64,
    ) -> Result<Vec<User>, DbError> {
        let horizon = now + chrono::Duration::days(max_bucket_days);
        let users = sqlx::query_as::<_, User>(
            "select * from users where subscription_end is not null and subscription_end > $1 and subscription_end <= $2",
        )
        .bind(now)
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Subscriptions that lapsed before `now` and are still marked active
    /// in the read model sense — the caller's expiry sweep drives these to
    /// expired.
    #[instrument(skip(self))]
    pub async fn list_subscriptions_expired_before(&self, now: DateTime<Utc>) -> Result<Vec<User>, DbError> {
        let users = sqlx::query_as::<_, User>(
            "select * from users where subscription_end is not null and subscription_end <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Users eligible for the auto-renewal sweep: `auto_renew` is set and
    /// the subscription lapses within `horizon` of `now` (spec.md's §4.5
    /// "subscription_end ≤ now + 1 day").
    #[instrument(skip(self))]
    pub async fn list_auto_renew_due(
        &self,
        now: DateTime<Utc>,
        horizon: chrono::Duration,
    ) -> Result<Vec<User>, DbError> {
        let cutoff = now + horizon;
        let users = sqlx::query_as::<_, User>(
            "select * from users where auto_renew and subscription_end is not null and subscription_end <= $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Re-reads one user row under a row lock, for the auto-renewal
    /// sweep's per-user "re-read under lock" step.
    #[instrument(skip(self, tx))]
    pub async fn lock_for_update(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: i64,
    ) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>("select * from users where id = $1 for update")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(user)
    }

    /// Advances `subscription_end` inside the same transaction that holds
    /// the row lock, conditioned on it still matching what was just read
    /// under that lock. A concurrent sweep tick that raced in between the
    /// lock read and this write loses: its own conditional update matches
    /// nothing, so it skips the user instead of renewing (and debiting)
    /// it a second time. Returns whether the row was actually advanced.
    #[instrument(skip(self, tx))]
    pub async fn advance_subscription_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: i64,
        expected_end: Option<DateTime<Utc>>,
        new_end: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let updated: Option<(i64,)> = sqlx::query_as(
            r#"
            update users set subscription_end = $3, updated_at = now()
            where id = $1 and subscription_end is not distinct from $2
            returning id
            "#,
        )
        .bind(user_id)
        .bind(expected_end)
        .bind(new_end)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(updated.is_some())
    }
}
