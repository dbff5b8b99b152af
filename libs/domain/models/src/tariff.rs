use crate::enums::PeriodUnit;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable plan. Soft-deactivated, never hard-deleted — historic
/// invoices keep referencing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tariff {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub tokens: i64,
    pub period_unit: PeriodUnit,
    pub period_value: i32,
    pub subscription_fee: i64,
    pub min_payment: Decimal,
    pub is_active: bool,
    pub sort_order: i32,
    pub version: i32,
}

impl Tariff {
    pub fn period(&self) -> (PeriodUnit, i32) {
        (self.period_unit, self.period_value)
    }
}
