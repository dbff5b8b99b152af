use serde::{Deserialize, Serialize};

/// Lifecycle state of an [`crate::Invoice`]. Transitions only ever leave
/// `Pending`; every other state is terminal for that invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Expired,
    Cancelled,
    Refunded,
}

impl InvoiceStatus {
    /// Every state other than `Pending` is a dead end for this invoice.
    pub fn is_terminal(self) -> bool {
        !matches!(self, InvoiceStatus::Pending)
    }
}

/// Ledger entry kind. Purely descriptive — the signed `tokens_delta` on the
/// transaction is what actually moves the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Topup,
    Spend,
    Refund,
    Adjustment,
    Subscription,
}

/// Discount shape a [`crate::PromoCode`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percent,
    Fixed,
    BonusTokens,
}

/// Unit a [`crate::Tariff`]'s subscription period is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "period_unit", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Hour,
    Day,
    Month,
}
