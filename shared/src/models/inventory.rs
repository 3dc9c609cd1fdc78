//! Inventory stock models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stock-keeping unit held in the warehouse
///
/// `quantity` counts units on the shelf, i.e. not checked out to any
/// suitcase item that is still in possession.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub unit_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
