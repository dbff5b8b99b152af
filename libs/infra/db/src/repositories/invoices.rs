use chrono::{DateTime, Utc};
use creditcore_domain_models::Invoice;
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::DbError;

pub struct InvoiceRepository {
    pool: PgPool,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub user_id: i64,
    pub tariff_id: Uuid,
    pub promo_id: Option<Uuid>,
    pub amount: Decimal,
    pub original_amount: Decimal,
    pub tokens: i64,
    pub subscription_days: i32,
    pub idempotency_key: String,
    pub payment_url: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new invoice, or returns the one already parked under the
    /// same idempotency key.
    #[instrument(skip(self, new_invoice))]
    pub async fn create_idempotent(&self, new_invoice: NewInvoice) -> Result<Invoice, DbError> {
        let inserted = sqlx::query_as::<_, Invoice>(
            r#"
            insert into invoices
                (user_id, tariff_id, promo_id, amount, original_amount, tokens,
                 subscription_days, idempotency_key, payment_url, expires_at)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            on conflict (idempotency_key) do nothing
            returning *
            "#,
        )
        .bind(new_invoice.user_id)
        .bind(new_invoice.tariff_id)
        .bind(new_invoice.promo_id)
        .bind(new_invoice.amount)
        .bind(new_invoice.original_amount)
        .bind(new_invoice.tokens)
        .bind(new_invoice.subscription_days)
        .bind(&new_invoice.idempotency_key)
        .bind(&new_invoice.payment_url)
        .bind(new_invoice.expires_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(invoice) => Ok(invoice),
            None => {
                let existing = sqlx::query_as::<_, Invoice>("select * from invoices where idempotency_key = $1")
                    .bind(&new_invoice.idempotency_key)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(existing)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, invoice_id: Uuid) -> Result<Option<Invoice>, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>("select * from invoices where id = $1")
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn get_by_idempotency_key(&self, idempotency_key: &str) -> Result<Option<Invoice>, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>("select * from invoices where idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn get_by_gateway_ref(&self, gateway_ref: i64) -> Result<Option<Invoice>, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>("select * from invoices where gateway_ref = $1")
            .bind(gateway_ref)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn set_payment_url(&self, invoice_id: Uuid, payment_url: &str) -> Result<(), DbError> {
        sqlx::query("update invoices set payment_url = $2 where id = $1")
            .bind(invoice_id)
            .bind(payment_url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Locks one invoice row for the duration of the caller's transaction,
    /// serializing concurrent webhook deliveries for the same invoice.
    #[instrument(skip(self, tx))]
    pub async fn lock_for_update(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>("select * from invoices where id = $1 for update")
            .bind(invoice_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(invoice)
    }

    /// Same row-lock as [`Self::lock_for_update`], keyed by `gateway_ref`
    /// (what the webhook actually carries before the invoice UUID is known).
    #[instrument(skip(self, tx))]
    pub async fn lock_by_gateway_ref_for_update(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        gateway_ref: i64,
    ) -> Result<Option<Invoice>, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>("select * from invoices where gateway_ref = $1 for update")
            .bind(gateway_ref)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(invoice)
    }

    /// Marks a pending invoice paid within an already-open transaction, so
    /// the caller can compose it with the ledger mutation and subscription
    /// update in the same unit of work.
    #[instrument(skip(self, tx))]
    pub async fn mark_paid_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        invoice_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "update invoices set status = 'paid', paid_at = $2 where id = $1 and status = 'pending' returning *",
        )
        .bind(invoice_id)
        .bind(paid_at)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(invoice)
    }

    /// Marks a pending invoice paid. Returns `None` if it was already in a
    /// terminal state — the caller treats that as "nothing to do", the
    /// idempotent half of webhook processing.
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, invoice_id: Uuid, paid_at: DateTime<Utc>) -> Result<Option<Invoice>, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "update invoices set status = 'paid', paid_at = $2 where id = $1 and status = 'pending' returning *",
        )
        .bind(invoice_id)
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, invoice_id: Uuid) -> Result<Option<Invoice>, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "update invoices set status = 'cancelled' where id = $1 and status = 'pending' returning *",
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    /// Flips every pending invoice past its TTL to `expired`. Safe to call
    /// repeatedly — a second sweep over the same cutoff finds nothing left
    /// in `pending` to flip.
    #[instrument(skip(self))]
    pub async fn expire_before(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, DbError> {
        let expired = sqlx::query_as::<_, Invoice>(
            "update invoices set status = 'expired' where status = 'pending' and expires_at < $1 returning *",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(expired)
    }
}
