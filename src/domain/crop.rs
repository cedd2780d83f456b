use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A farmer's listing. `reserved_quantity` is held by in-flight orders and
/// is only subtracted from `quantity` when an order completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub price_per_unit: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Crop {
    pub fn available_quantity(&self) -> i32 {
        self.quantity - self.reserved_quantity
    }
}

#[derive(Debug, Clone)]
pub struct NewCrop {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: i32,
    pub price_per_unit: BigDecimal,
}
