//! Suitcase item models and the item status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// An inventory item checked out into a suitcase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuitcaseItem {
    pub id: Uuid,
    pub suitcase_id: Uuid,
    pub inventory_id: Uuid,
    pub quantity: i32,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of a suitcase item
///
/// `InPossession` is the initial state. `Sold`, `Returned` and `Lost` are
/// terminal under normal flow; the only way back is `Sold -> InPossession`
/// through a settlement reversal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    InPossession,
    Sold,
    Returned,
    Lost,
}

/// Which path a status change is taking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Day-to-day movement out of `InPossession`
    Forward,
    /// Compensation issued by a settlement reversal
    Reversal,
}

/// Rejected status change or mutation of a settled item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("suitcase item cannot move from {from} to {to}")]
    Transition { from: ItemStatus, to: ItemStatus },

    #[error("suitcase item is {status}; only items in possession can be changed")]
    NotMutable { status: ItemStatus },
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::InPossession => "in_possession",
            ItemStatus::Sold => "sold",
            ItemStatus::Returned => "returned",
            ItemStatus::Lost => "lost",
        }
    }

    /// Check whether `next` is reachable from this status along `kind`
    pub fn can_transition_to(&self, next: ItemStatus, kind: TransitionKind) -> bool {
        use ItemStatus::*;

        match kind {
            TransitionKind::Forward => {
                matches!((self, next), (InPossession, Sold | Returned | Lost))
            }
            // Restoring an item that is already in possession is a no-op,
            // which keeps reversal retries harmless.
            TransitionKind::Reversal => {
                matches!((self, next), (Sold | InPossession, InPossession))
            }
        }
    }

    /// Apply a transition, returning the new status
    pub fn transition(
        &self,
        next: ItemStatus,
        kind: TransitionKind,
    ) -> Result<ItemStatus, InvalidTransition> {
        if self.can_transition_to(next, kind) {
            Ok(next)
        } else {
            Err(InvalidTransition::Transition {
                from: *self,
                to: next,
            })
        }
    }

    /// Quantity changes and sale annotations are only allowed while in possession
    pub fn ensure_mutable(&self) -> Result<(), InvalidTransition> {
        match self {
            ItemStatus::InPossession => Ok(()),
            status => Err(InvalidTransition::NotMutable { status: *status }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemStatus::InPossession)
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_possession" => Ok(ItemStatus::InPossession),
            "sold" => Ok(ItemStatus::Sold),
            "returned" => Ok(ItemStatus::Returned),
            "lost" => Ok(ItemStatus::Lost),
            other => Err(format!("unknown suitcase item status: {}", other)),
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-of-sale note attached to an item before settlement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleAnnotation {
    pub suitcase_item_id: Uuid,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
