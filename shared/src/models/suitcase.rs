//! Suitcase (maleta) and seller models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A mobile inventory container assigned to a reseller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suitcase {
    pub id: Uuid,
    /// Human-facing code printed on the suitcase label (e.g., "MAL-0042")
    pub code: String,
    pub seller_id: Uuid,
    pub status: SuitcaseStatus,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    pub next_settlement_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a suitcase currently is in its lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SuitcaseStatus {
    InUse,
    Returned,
    Lost,
    InAudit,
    InReplenishment,
}

impl SuitcaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuitcaseStatus::InUse => "in_use",
            SuitcaseStatus::Returned => "returned",
            SuitcaseStatus::Lost => "lost",
            SuitcaseStatus::InAudit => "in_audit",
            SuitcaseStatus::InReplenishment => "in_replenishment",
        }
    }
}

impl std::str::FromStr for SuitcaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_use" => Ok(SuitcaseStatus::InUse),
            "returned" => Ok(SuitcaseStatus::Returned),
            "lost" => Ok(SuitcaseStatus::Lost),
            "in_audit" => Ok(SuitcaseStatus::InAudit),
            "in_replenishment" => Ok(SuitcaseStatus::InReplenishment),
            other => Err(format!("unknown suitcase status: {}", other)),
        }
    }
}

impl std::fmt::Display for SuitcaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field reseller carrying one or more suitcases
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seller {
    pub id: Uuid,
    pub name: String,
    /// Fraction of sales owed to the seller; `None` falls back to the default rate
    pub commission_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
