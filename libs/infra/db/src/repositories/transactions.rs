use chrono::Utc;
use creditcore_domain_billing::{
    apply_credit, apply_debit, cas_backoff, guard_credit, guard_debit, BillingError, BillingResult,
    DEFAULT_BALANCE_FLOOR, MAX_CAS_ATTEMPTS,
};
use creditcore_domain_models::{Transaction, TransactionType, User};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::DbError;

pub struct LedgerRepository {
    pool: PgPool,
}

/// Everything needed to append one ledger entry. `delta` is signed: a
/// positive value credits the user, a negative value debits them.
#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub user_id: i64,
    pub transaction_type: TransactionType,
    pub delta: Decimal,
    pub description: &'a str,
    pub invoice_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub idempotency_key: Option<&'a str>,
    /// Whether this debit may drive the balance negative (down to
    /// `-floor`) rather than being refused the moment it would cross zero.
    /// Ignored for credits.
    pub allow_deferred: bool,
    /// Maximum overdraft magnitude permitted when `allow_deferred` is set.
    pub floor: rust_decimal::Decimal,
}

impl<'a> LedgerEntry<'a> {
    /// Convenience constructor for a plain (non-deferred) mutation using
    /// the default floor — the common case for top-ups and API spends.
    pub fn new(
        user_id: i64,
        transaction_type: TransactionType,
        delta: Decimal,
        description: &'a str,
    ) -> Self {
        Self {
            user_id,
            transaction_type,
            delta,
            description,
            invoice_id: None,
            metadata: None,
            idempotency_key: None,
            allow_deferred: false,
            floor: DEFAULT_BALANCE_FLOOR,
        }
    }
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, DbError> {
        let tx = sqlx::query_as::<_, Transaction>("select * from transactions where idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tx)
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>, DbError> {
        let rows = sqlx::query_as::<_, Transaction>(
            "select * from transactions where user_id = $1 order by created_at desc limit $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Applies one signed balance mutation under optimistic concurrency
    /// control: read the user, guard the move, then
    /// `UPDATE ... WHERE balance_version = :v`, retrying on a lost race up
    /// to [`MAX_CAS_ATTEMPTS`] times. If `idempotency_key` was already
    /// applied, the prior transaction is returned unchanged rather than the
    /// ledger being mutated a second time.
    #[instrument(skip(self, entry), fields(user_id = entry.user_id))]
    pub async fn apply(&self, entry: LedgerEntry<'_>) -> Result<Transaction, BillingError> {
        if let Some(key) = entry.idempotency_key {
            if let Some(existing) = self
                .get_by_idempotency_key(key)
                .await
                .map_err(BillingError::from)?
            {
                return Ok(existing);
            }
        }

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            match self.try_apply_once(&entry).await {
                Ok(transaction) => return Ok(transaction),
                Err(CasOutcome::LostRace) => {
                    warn!(attempt, "ledger CAS attempt lost the race, retrying");
                    tokio::time::sleep(cas_backoff(attempt)).await;
                }
                Err(CasOutcome::Db(err)) => return Err(BillingError::from(err)),
                Err(CasOutcome::Guard(err)) => return Err(err),
            }
        }
        Err(BillingError::ConcurrentModification)
    }

    async fn try_apply_once(&self, entry: &LedgerEntry<'_>) -> Result<Transaction, CasOutcome> {
        let user = sqlx::query_as::<_, User>("select * from users where id = $1")
            .bind(entry.user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| {
                CasOutcome::Guard(BillingError::NotFound { entity: "user", id: entry.user_id.to_string() })
            })?;

        guard(&user, entry).map_err(CasOutcome::Guard)?;

        let new_balance = if entry.delta.is_sign_negative() {
            apply_debit(user.balance, -entry.delta)
        } else {
            apply_credit(user.balance, entry.delta)
        };

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let updated: Option<(i64,)> = sqlx::query_as(
            r#"
            update users set balance = $3, balance_version = balance_version + 1, updated_at = now()
            where id = $1 and balance_version = $2
            returning balance_version
            "#,
        )
        .bind(entry.user_id)
        .bind(user.balance_version)
        .bind(new_balance)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if updated.is_none() {
            return Err(CasOutcome::LostRace);
        }

        let inserted = sqlx::query_as::<_, Transaction>(
            r#"
            insert into transactions
                (user_id, transaction_type, tokens_delta, balance_after, description,
                 invoice_id, metadata, idempotency_key, created_at)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            returning *
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.transaction_type)
        .bind(entry.delta)
        .bind(new_balance)
        .bind(entry.description)
        .bind(entry.invoice_id)
        .bind(&entry.metadata)
        .bind(entry.idempotency_key)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await;

        let transaction = match inserted {
            Ok(transaction) => transaction,
            Err(err) if is_unique_violation(&err) => {
                // Lost the idempotency-key race to a concurrent caller that
                // beat us to the insert: the balance bump above is still
                // uncommitted, so rolling back discards it and the winner's
                // transaction is the one and only effect of this key.
                tx.rollback().await.ok();
                if let Some(key) = entry.idempotency_key {
                    if let Some(existing) = self.get_by_idempotency_key(key).await.map_err(CasOutcome::Db)? {
                        return Ok(existing);
                    }
                }
                return Err(CasOutcome::Db(DbError::from(err)));
            }
            Err(err) => return Err(CasOutcome::Db(DbError::from(err))),
        };

        tx.commit().await.map_err(DbError::from)?;
        Ok(transaction)
    }
}

/// Whether a postgres error is a unique-constraint violation (`23505`) —
/// the idempotency-key race this module's `apply` tolerates.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db_err| db_err.code().as_deref() == Some("23505"))
}

fn guard(user: &User, entry: &LedgerEntry<'_>) -> BillingResult<()> {
    if entry.delta.is_sign_negative() {
        guard_debit(user, -entry.delta, entry.allow_deferred, entry.floor)
    } else {
        guard_credit(entry.delta)
    }
}

enum CasOutcome {
    LostRace,
    Db(DbError),
    Guard(BillingError),
}

impl From<DbError> for CasOutcome {
    fn from(err: DbError) -> Self {
        CasOutcome::Db(err)
    }
}
