//! Settlement (acerto) and sold-item ledger models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A periodic reconciliation of a suitcase against what was sold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub id: Uuid,
    pub suitcase_id: Uuid,
    pub seller_id: Uuid,
    pub settlement_date: NaiveDate,
    pub next_settlement_date: Option<NaiveDate>,
    pub total_sales: Decimal,
    pub commission_amount: Decimal,
    pub status: SettlementStatus,
    pub receipt_url: Option<String>,
    /// SHA-256 (hex) of the rendered receipt artifact
    pub receipt_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settlement status. Wire values keep the field team's vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SettlementStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "concluido")]
    Completed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pendente",
            SettlementStatus::Completed => "concluido",
        }
    }

    /// A completed settlement owns its sold-item records and is never reopened
    pub fn can_transition_to(&self, next: SettlementStatus) -> bool {
        !matches!(
            (self, next),
            (SettlementStatus::Completed, SettlementStatus::Pending)
        )
    }
}

impl std::str::FromStr for SettlementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendente" => Ok(SettlementStatus::Pending),
            "concluido" => Ok(SettlementStatus::Completed),
            other => Err(format!("unknown settlement status: {}", other)),
        }
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sold suitcase item recorded against a settlement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoldItemRecord {
    pub id: Uuid,
    pub settlement_id: Uuid,
    pub suitcase_item_id: Uuid,
    pub inventory_id: Uuid,
    /// Unit price at the time of sale
    pub price: Decimal,
    /// Quantity the suitcase item carried, kept so a reversal can re-attach it
    pub quantity: i32,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Settlement with its joined sold-item records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementDetails {
    #[serde(flatten)]
    pub settlement: Settlement,
    pub sold_items: Vec<SoldItemRecord>,
}

impl SettlementDetails {
    pub fn sold_item_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.sold_items.iter().map(|r| r.suitcase_item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_settlement_is_never_reopened() {
        use SettlementStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Pending));
        assert!(Completed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
    }
}
