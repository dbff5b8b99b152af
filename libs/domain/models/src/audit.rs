use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One append-only audit row: a structured before/after snapshot of a
/// state-changing decision. `user_id` is deliberately not a foreign key —
/// the audit trail must survive the deletion of the entity it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: Option<i64>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Stable action-name constants for the audit trail's stringly-typed but
/// append-only convention.
pub mod actions {
    pub const USER_CREATED: &str = "user.created";
    pub const PAYMENT_PROCESSED: &str = "payment.processed";
    pub const INVOICE_CREATED: &str = "invoice.created";
    pub const INVOICE_CANCELLED: &str = "invoice.cancelled";
    pub const INVOICES_EXPIRED: &str = "invoices.expired";
    pub const TOKENS_SPENT: &str = "tokens.spent";
    pub const SUBSCRIPTION_RENEWED: &str = "subscription.renewed";
    pub const SUBSCRIPTION_RENEWAL_FAILED: &str = "subscription.renewal_failed";
}
