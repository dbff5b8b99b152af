use crate::enums::TransactionType;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One append-only ledger entry. Never updated, never deleted — the
/// sequence of `balance_after` values for a user, ordered by `created_at`,
/// is the cumulative sum of `tokens_delta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: i64,
    pub transaction_type: TransactionType,
    pub tokens_delta: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    pub invoice_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
