//! Persistence boundary for the settlement engine
//!
//! Every record the engine touches lives behind these traits. Each call is an
//! independent remote operation; the traits make no promise that two calls
//! commit together. Operations that must not lose updates (inventory
//! adjustments, status changes) are single compare-and-update calls.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    InventoryItem, ItemStatus, Pagination, SaleAnnotation, Seller, Settlement, SettlementStatus,
    SoldItemRecord, Suitcase, SuitcaseItem, TransitionKind,
};

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, InMemoryStore};
pub use postgres::PgStore;

/// New suitcase item; created in `InPossession`
#[derive(Debug, Clone)]
pub struct NewSuitcaseItem {
    pub suitcase_id: Uuid,
    pub inventory_id: Uuid,
    pub quantity: i32,
}

/// A sold item being put back into its suitcase by a reversal
#[derive(Debug, Clone)]
pub struct RestoredItem {
    pub id: Uuid,
    pub suitcase_id: Uuid,
    pub inventory_id: Uuid,
    pub quantity: i32,
}

/// Result of restoring one item to `InPossession`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Was `Sold`, now `InPossession`
    Restored,
    /// Already `InPossession`; nothing changed
    AlreadyInPossession,
    /// The row had been removed by cleanup and was re-attached
    Reattached,
    /// Item is `Returned` or `Lost` and was left alone
    Skipped(ItemStatus),
}

impl RestoreOutcome {
    /// Outcome of restoring an existing row, decided by the item state machine
    pub fn for_status(status: ItemStatus) -> Self {
        match status.transition(ItemStatus::InPossession, TransitionKind::Reversal) {
            Ok(_) if status == ItemStatus::InPossession => RestoreOutcome::AlreadyInPossession,
            Ok(_) => RestoreOutcome::Restored,
            Err(_) => RestoreOutcome::Skipped(status),
        }
    }
}

/// Outcome of resizing an item's quantity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeOutcome {
    Resized(SuitcaseItem),
    /// The item left `InPossession` before the update landed
    NotInPossession(ItemStatus),
}

#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub suitcase_id: Uuid,
    pub seller_id: Uuid,
    pub settlement_date: NaiveDate,
    pub next_settlement_date: Option<NaiveDate>,
    pub total_sales: Decimal,
    pub commission_amount: Decimal,
    pub status: SettlementStatus,
}

/// Full overwrite of a settlement's mutable fields
#[derive(Debug, Clone)]
pub struct SettlementUpdate {
    pub seller_id: Uuid,
    pub settlement_date: NaiveDate,
    pub next_settlement_date: Option<NaiveDate>,
    pub total_sales: Decimal,
    pub commission_amount: Decimal,
    pub status: SettlementStatus,
}

impl From<&Settlement> for SettlementUpdate {
    fn from(s: &Settlement) -> Self {
        Self {
            seller_id: s.seller_id,
            settlement_date: s.settlement_date,
            next_settlement_date: s.next_settlement_date,
            total_sales: s.total_sales,
            commission_amount: s.commission_amount,
            status: s.status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSoldItemRecord {
    pub settlement_id: Uuid,
    pub suitcase_item_id: Uuid,
    pub inventory_id: Uuid,
    pub price: Decimal,
    pub quantity: i32,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
}

/// Filters for listing settlements
#[derive(Debug, Clone, Default)]
pub struct SettlementFilter {
    pub suitcase_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub status: Option<SettlementStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Pagination,
}

impl SettlementFilter {
    pub fn matches(&self, s: &Settlement) -> bool {
        self.suitcase_id.map_or(true, |id| s.suitcase_id == id)
            && self.seller_id.map_or(true, |id| s.seller_id == id)
            && self.status.map_or(true, |status| s.status == status)
            && self.from.map_or(true, |from| s.settlement_date >= from)
            && self.to.map_or(true, |to| s.settlement_date <= to)
    }
}

/// Suitcases, their items and point-of-sale notes
#[async_trait]
pub trait SuitcaseStore: Send + Sync {
    async fn get_suitcase(&self, id: Uuid) -> AppResult<Option<Suitcase>>;

    async fn get_seller(&self, id: Uuid) -> AppResult<Option<Seller>>;

    async fn set_next_settlement_date(&self, suitcase_id: Uuid, date: NaiveDate) -> AppResult<()>;

    async fn list_suitcase_items(
        &self,
        suitcase_id: Uuid,
        status: Option<ItemStatus>,
    ) -> AppResult<Vec<SuitcaseItem>>;

    async fn get_suitcase_item(&self, id: Uuid) -> AppResult<Option<SuitcaseItem>>;

    async fn insert_suitcase_item(&self, item: NewSuitcaseItem) -> AppResult<SuitcaseItem>;

    /// Set `next` only if the item currently has `expected`; returns whether it did
    async fn compare_and_set_item_status(
        &self,
        id: Uuid,
        expected: ItemStatus,
        next: ItemStatus,
    ) -> AppResult<bool>;

    /// Change an in-possession item's quantity and move the difference
    /// to or from inventory in one step
    async fn resize_item(&self, id: Uuid, quantity: i32) -> AppResult<ResizeOutcome>;

    /// `InPossession -> Returned` plus the matching inventory increment, in one step.
    /// Returns false when the item was no longer in possession.
    async fn return_item_to_stock(&self, id: Uuid) -> AppResult<bool>;

    /// Put a settled item back in its suitcase as `InPossession`, re-creating it
    /// if cleanup removed it
    async fn restore_suitcase_item(&self, item: RestoredItem) -> AppResult<RestoreOutcome>;

    /// Remove every item attached to the suitcase regardless of status
    async fn delete_suitcase_items(&self, suitcase_id: Uuid) -> AppResult<u64>;

    async fn count_suitcase_items(&self, suitcase_id: Uuid) -> AppResult<i64>;

    async fn sale_annotation(&self, suitcase_item_id: Uuid) -> AppResult<Option<SaleAnnotation>>;

    async fn upsert_sale_annotation(&self, annotation: SaleAnnotation) -> AppResult<SaleAnnotation>;
}

/// Warehouse stock
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    async fn get_inventory_items(&self, ids: &[Uuid]) -> AppResult<Vec<InventoryItem>>;

    /// Atomically add `delta` (negative to check out) and return the new quantity.
    /// Fails with `InsufficientStock` rather than going below zero.
    async fn adjust_quantity(&self, inventory_id: Uuid, delta: i32) -> AppResult<i32>;
}

/// Settlements and the sold-item ledger
#[async_trait]
pub trait SettlementLedger: Send + Sync {
    async fn find_pending_settlement(&self, suitcase_id: Uuid) -> AppResult<Option<Settlement>>;

    /// Fails with `Conflict` when a second pending settlement would exist
    async fn insert_settlement(&self, settlement: NewSettlement) -> AppResult<Settlement>;

    async fn update_settlement(&self, id: Uuid, update: SettlementUpdate) -> AppResult<Settlement>;

    async fn set_settlement_status(
        &self,
        id: Uuid,
        status: SettlementStatus,
    ) -> AppResult<Option<Settlement>>;

    async fn set_receipt(&self, id: Uuid, url: &str, digest: &str) -> AppResult<()>;

    async fn get_settlement(&self, id: Uuid) -> AppResult<Option<Settlement>>;

    async fn list_settlements(&self, filter: &SettlementFilter) -> AppResult<Vec<Settlement>>;

    async fn delete_settlement(&self, id: Uuid) -> AppResult<bool>;

    async fn insert_sold_item(&self, record: NewSoldItemRecord) -> AppResult<SoldItemRecord>;

    async fn list_sold_items(&self, settlement_id: Uuid) -> AppResult<Vec<SoldItemRecord>>;

    async fn delete_sold_item(&self, id: Uuid) -> AppResult<()>;

    async fn purge_sold_items(&self, settlement_id: Uuid) -> AppResult<u64>;

    async fn void_sold_items(&self, settlement_id: Uuid, at: DateTime<Utc>) -> AppResult<u64>;
}

/// Everything the engine needs from storage
#[async_trait]
pub trait Store: SuitcaseStore + InventoryLedger + SettlementLedger {
    /// Connectivity check used by the health endpoint
    async fn ping(&self) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement(date: NaiveDate, status: SettlementStatus) -> Settlement {
        Settlement {
            id: Uuid::new_v4(),
            suitcase_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            settlement_date: date,
            next_settlement_date: None,
            total_sales: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            status,
            receipt_url: None,
            receipt_digest: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_matches_date_window_inclusive() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let s = settlement(date, SettlementStatus::Completed);

        let filter = SettlementFilter {
            from: Some(date),
            to: Some(date),
            ..Default::default()
        };
        assert!(filter.matches(&s));

        let later = SettlementFilter {
            from: date.succ_opt(),
            ..Default::default()
        };
        assert!(!later.matches(&s));
    }

    #[test]
    fn test_filter_by_status_and_suitcase() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let s = settlement(date, SettlementStatus::Pending);

        let pending = SettlementFilter {
            status: Some(SettlementStatus::Pending),
            suitcase_id: Some(s.suitcase_id),
            ..Default::default()
        };
        assert!(pending.matches(&s));

        let other_suitcase = SettlementFilter {
            suitcase_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(!other_suitcase.matches(&s));
    }

    #[test]
    fn test_restore_outcome_for_each_status() {
        assert_eq!(
            RestoreOutcome::for_status(ItemStatus::Sold),
            RestoreOutcome::Restored
        );
        assert_eq!(
            RestoreOutcome::for_status(ItemStatus::InPossession),
            RestoreOutcome::AlreadyInPossession
        );
        assert_eq!(
            RestoreOutcome::for_status(ItemStatus::Returned),
            RestoreOutcome::Skipped(ItemStatus::Returned)
        );
        assert_eq!(
            RestoreOutcome::for_status(ItemStatus::Lost),
            RestoreOutcome::Skipped(ItemStatus::Lost)
        );
    }
}
