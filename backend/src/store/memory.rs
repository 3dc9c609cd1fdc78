//! In-memory store
//!
//! Keeps every collection in one mutex-guarded set of tables. Used by the
//! test suite and for running the server without a database. Fail points
//! let tests break individual operations to exercise partial failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    InventoryItem, ItemStatus, SaleAnnotation, Seller, Settlement, SettlementStatus,
    SoldItemRecord, Suitcase, SuitcaseItem, SuitcaseStatus,
};

use super::{
    InventoryLedger, NewSettlement, NewSoldItemRecord, NewSuitcaseItem, ResizeOutcome,
    RestoreOutcome, RestoredItem, SettlementFilter, SettlementLedger, SettlementUpdate, Store,
    SuitcaseStore,
};
use crate::error::{AppError, AppResult};

/// Operations that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertSuitcaseItem,
    CompareAndSetItemStatus,
    SetNextSettlementDate,
    DeleteSuitcaseItems,
    RestoreSuitcaseItem,
    InsertSettlement,
    UpdateSettlement,
    DeleteSettlement,
    InsertSoldItem,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    skip: u32,
    failures: u32,
}

#[derive(Debug, Default)]
struct Tables {
    sellers: HashMap<Uuid, Seller>,
    suitcases: HashMap<Uuid, Suitcase>,
    items: HashMap<Uuid, SuitcaseItem>,
    inventory: HashMap<Uuid, InventoryItem>,
    annotations: HashMap<Uuid, SaleAnnotation>,
    settlements: HashMap<Uuid, Settlement>,
    sold_items: Vec<SoldItemRecord>,
}

impl Tables {
    fn pending_for(&self, suitcase_id: Uuid, except: Option<Uuid>) -> Option<&Settlement> {
        self.settlements.values().find(|s| {
            s.suitcase_id == suitcase_id
                && s.status == SettlementStatus::Pending
                && Some(s.id) != except
        })
    }

    fn adjust_stock(&mut self, inventory_id: Uuid, delta: i32) -> AppResult<i32> {
        let item = self
            .inventory
            .get_mut(&inventory_id)
            .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;

        let next = match item.quantity.checked_add(delta) {
            Some(next) if next >= 0 => next,
            Some(_) => {
                return Err(AppError::InsufficientStock(format!(
                    "inventory item {} has {} unit(s), {} requested",
                    item.code,
                    item.quantity,
                    delta.unsigned_abs()
                )))
            }
            None => {
                return Err(AppError::validation(
                    "quantity",
                    "Stock adjustment is out of range",
                    "Ajuste de estoque fora do intervalo permitido",
                ))
            }
        };

        item.quantity = next;
        item.updated_at = Utc::now();
        Ok(next)
    }
}

fn pending_conflict() -> AppError {
    AppError::Conflict {
        resource: "settlement".to_string(),
        message: "Suitcase already has a pending settlement".to_string(),
        message_pt: "A maleta já possui um acerto pendente".to_string(),
    }
}

/// Mutex-backed implementation of [`Store`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<HashMap<FailPoint, Fault>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }

    /// Make the next `times` calls to `point` fail
    pub fn fail_next(&self, point: FailPoint, times: u32) {
        self.fail_after(point, 0, times);
    }

    /// Let `skip` calls to `point` succeed, then fail the following `times` calls
    pub fn fail_after(&self, point: FailPoint, skip: u32, times: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(
                point,
                Fault {
                    skip,
                    failures: times,
                },
            );
        }
    }

    fn check(&self, point: FailPoint) -> AppResult<()> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| AppError::Internal("fault table lock poisoned".to_string()))?;

        if let Some(fault) = faults.get_mut(&point) {
            if fault.skip > 0 {
                fault.skip -= 1;
            } else if fault.failures > 0 {
                fault.failures -= 1;
                return Err(AppError::Storage(format!("injected failure at {:?}", point)));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Seeding and inspection
    // ------------------------------------------------------------------

    pub fn add_seller(&self, name: &str, commission_rate: Option<Decimal>) -> AppResult<Seller> {
        let now = Utc::now();
        let seller = Seller {
            id: Uuid::new_v4(),
            name: name.to_string(),
            commission_rate,
            created_at: now,
            updated_at: now,
        };
        self.tables()?.sellers.insert(seller.id, seller.clone());
        Ok(seller)
    }

    pub fn add_suitcase(&self, code: &str, seller_id: Uuid) -> AppResult<Suitcase> {
        let now = Utc::now();
        let suitcase = Suitcase {
            id: Uuid::new_v4(),
            code: code.to_string(),
            seller_id,
            status: SuitcaseStatus::InUse,
            city: None,
            neighborhood: None,
            next_settlement_date: None,
            created_at: now,
            updated_at: now,
        };
        self.tables()?.suitcases.insert(suitcase.id, suitcase.clone());
        Ok(suitcase)
    }

    pub fn add_inventory_item(
        &self,
        code: &str,
        price: Decimal,
        quantity: i32,
    ) -> AppResult<InventoryItem> {
        let now = Utc::now();
        let item = InventoryItem {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            quantity,
            price,
            unit_cost: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        self.tables()?.inventory.insert(item.id, item.clone());
        Ok(item)
    }

    pub fn inventory_quantity(&self, inventory_id: Uuid) -> AppResult<Option<i32>> {
        Ok(self.tables()?.inventory.get(&inventory_id).map(|i| i.quantity))
    }

    /// Every sold-item row ever written, voided or not, in insertion order
    pub fn all_sold_items(&self) -> AppResult<Vec<SoldItemRecord>> {
        Ok(self.tables()?.sold_items.clone())
    }

    pub fn settlement_count(&self) -> AppResult<usize> {
        Ok(self.tables()?.settlements.len())
    }
}

#[async_trait]
impl SuitcaseStore for InMemoryStore {
    async fn get_suitcase(&self, id: Uuid) -> AppResult<Option<Suitcase>> {
        Ok(self.tables()?.suitcases.get(&id).cloned())
    }

    async fn get_seller(&self, id: Uuid) -> AppResult<Option<Seller>> {
        Ok(self.tables()?.sellers.get(&id).cloned())
    }

    async fn set_next_settlement_date(&self, suitcase_id: Uuid, date: NaiveDate) -> AppResult<()> {
        self.check(FailPoint::SetNextSettlementDate)?;
        let mut tables = self.tables()?;
        let suitcase = tables
            .suitcases
            .get_mut(&suitcase_id)
            .ok_or_else(|| AppError::NotFound("Suitcase".to_string()))?;
        suitcase.next_settlement_date = Some(date);
        suitcase.updated_at = Utc::now();
        Ok(())
    }

    async fn list_suitcase_items(
        &self,
        suitcase_id: Uuid,
        status: Option<ItemStatus>,
    ) -> AppResult<Vec<SuitcaseItem>> {
        let tables = self.tables()?;
        let mut items: Vec<SuitcaseItem> = tables
            .items
            .values()
            .filter(|i| i.suitcase_id == suitcase_id)
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn get_suitcase_item(&self, id: Uuid) -> AppResult<Option<SuitcaseItem>> {
        Ok(self.tables()?.items.get(&id).cloned())
    }

    async fn insert_suitcase_item(&self, item: NewSuitcaseItem) -> AppResult<SuitcaseItem> {
        self.check(FailPoint::InsertSuitcaseItem)?;
        let mut tables = self.tables()?;
        if !tables.suitcases.contains_key(&item.suitcase_id) {
            return Err(AppError::NotFound("Suitcase".to_string()));
        }

        let now = Utc::now();
        let record = SuitcaseItem {
            id: Uuid::new_v4(),
            suitcase_id: item.suitcase_id,
            inventory_id: item.inventory_id,
            quantity: item.quantity,
            status: ItemStatus::InPossession,
            created_at: now,
            updated_at: now,
        };
        tables.items.insert(record.id, record.clone());
        Ok(record)
    }

    async fn compare_and_set_item_status(
        &self,
        id: Uuid,
        expected: ItemStatus,
        next: ItemStatus,
    ) -> AppResult<bool> {
        self.check(FailPoint::CompareAndSetItemStatus)?;
        let mut tables = self.tables()?;
        match tables.items.get_mut(&id) {
            Some(item) if item.status == expected => {
                item.status = next;
                item.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn resize_item(&self, id: Uuid, quantity: i32) -> AppResult<ResizeOutcome> {
        let mut tables = self.tables()?;
        let item = tables
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Suitcase item".to_string()))?;

        if item.status != ItemStatus::InPossession {
            return Ok(ResizeOutcome::NotInPossession(item.status));
        }

        // Growing the item checks more units out of the warehouse
        tables.adjust_stock(item.inventory_id, item.quantity - quantity)?;

        let stored = tables
            .items
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Suitcase item".to_string()))?;
        stored.quantity = quantity;
        stored.updated_at = Utc::now();
        Ok(ResizeOutcome::Resized(stored.clone()))
    }

    async fn return_item_to_stock(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables()?;
        let item = tables
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Suitcase item".to_string()))?;

        if item.status != ItemStatus::InPossession {
            return Ok(false);
        }

        tables.adjust_stock(item.inventory_id, item.quantity)?;
        if let Some(stored) = tables.items.get_mut(&id) {
            stored.status = ItemStatus::Returned;
            stored.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn restore_suitcase_item(&self, item: RestoredItem) -> AppResult<RestoreOutcome> {
        self.check(FailPoint::RestoreSuitcaseItem)?;
        let mut tables = self.tables()?;
        let now = Utc::now();

        match tables.items.get_mut(&item.id) {
            Some(existing) => {
                let outcome = RestoreOutcome::for_status(existing.status);
                if outcome == RestoreOutcome::Restored {
                    existing.status = ItemStatus::InPossession;
                    existing.updated_at = now;
                }
                Ok(outcome)
            }
            None => {
                tables.items.insert(
                    item.id,
                    SuitcaseItem {
                        id: item.id,
                        suitcase_id: item.suitcase_id,
                        inventory_id: item.inventory_id,
                        quantity: item.quantity,
                        status: ItemStatus::InPossession,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(RestoreOutcome::Reattached)
            }
        }
    }

    async fn delete_suitcase_items(&self, suitcase_id: Uuid) -> AppResult<u64> {
        self.check(FailPoint::DeleteSuitcaseItems)?;
        let mut tables = self.tables()?;
        let before = tables.items.len();
        tables.items.retain(|_, i| i.suitcase_id != suitcase_id);
        let removed = before - tables.items.len();

        let remaining: Vec<Uuid> = tables.items.keys().copied().collect();
        tables.annotations.retain(|id, _| remaining.contains(id));
        Ok(removed as u64)
    }

    async fn count_suitcase_items(&self, suitcase_id: Uuid) -> AppResult<i64> {
        let tables = self.tables()?;
        Ok(tables
            .items
            .values()
            .filter(|i| i.suitcase_id == suitcase_id)
            .count() as i64)
    }

    async fn sale_annotation(&self, suitcase_item_id: Uuid) -> AppResult<Option<SaleAnnotation>> {
        Ok(self.tables()?.annotations.get(&suitcase_item_id).cloned())
    }

    async fn upsert_sale_annotation(&self, annotation: SaleAnnotation) -> AppResult<SaleAnnotation> {
        let mut tables = self.tables()?;
        if !tables.items.contains_key(&annotation.suitcase_item_id) {
            return Err(AppError::NotFound("Suitcase item".to_string()));
        }
        tables
            .annotations
            .insert(annotation.suitcase_item_id, annotation.clone());
        Ok(annotation)
    }
}

#[async_trait]
impl InventoryLedger for InMemoryStore {
    async fn get_inventory_items(&self, ids: &[Uuid]) -> AppResult<Vec<InventoryItem>> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.inventory.get(id).cloned())
            .collect())
    }

    async fn adjust_quantity(&self, inventory_id: Uuid, delta: i32) -> AppResult<i32> {
        self.tables()?.adjust_stock(inventory_id, delta)
    }
}

#[async_trait]
impl SettlementLedger for InMemoryStore {
    async fn find_pending_settlement(&self, suitcase_id: Uuid) -> AppResult<Option<Settlement>> {
        Ok(self.tables()?.pending_for(suitcase_id, None).cloned())
    }

    async fn insert_settlement(&self, new: NewSettlement) -> AppResult<Settlement> {
        self.check(FailPoint::InsertSettlement)?;
        let mut tables = self.tables()?;
        if new.status == SettlementStatus::Pending
            && tables.pending_for(new.suitcase_id, None).is_some()
        {
            return Err(pending_conflict());
        }

        let now = Utc::now();
        let settlement = Settlement {
            id: Uuid::new_v4(),
            suitcase_id: new.suitcase_id,
            seller_id: new.seller_id,
            settlement_date: new.settlement_date,
            next_settlement_date: new.next_settlement_date,
            total_sales: new.total_sales,
            commission_amount: new.commission_amount,
            status: new.status,
            receipt_url: None,
            receipt_digest: None,
            created_at: now,
            updated_at: now,
        };
        tables.settlements.insert(settlement.id, settlement.clone());
        Ok(settlement)
    }

    async fn update_settlement(&self, id: Uuid, update: SettlementUpdate) -> AppResult<Settlement> {
        self.check(FailPoint::UpdateSettlement)?;
        let mut tables = self.tables()?;
        let suitcase_id = tables
            .settlements
            .get(&id)
            .map(|s| s.suitcase_id)
            .ok_or_else(|| AppError::NotFound("Settlement".to_string()))?;

        if update.status == SettlementStatus::Pending
            && tables.pending_for(suitcase_id, Some(id)).is_some()
        {
            return Err(pending_conflict());
        }

        let settlement = tables
            .settlements
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Settlement".to_string()))?;
        settlement.seller_id = update.seller_id;
        settlement.settlement_date = update.settlement_date;
        settlement.next_settlement_date = update.next_settlement_date;
        settlement.total_sales = update.total_sales;
        settlement.commission_amount = update.commission_amount;
        settlement.status = update.status;
        settlement.updated_at = Utc::now();
        Ok(settlement.clone())
    }

    async fn set_settlement_status(
        &self,
        id: Uuid,
        status: SettlementStatus,
    ) -> AppResult<Option<Settlement>> {
        let mut tables = self.tables()?;
        let Some(suitcase_id) = tables.settlements.get(&id).map(|s| s.suitcase_id) else {
            return Ok(None);
        };

        if status == SettlementStatus::Pending
            && tables.pending_for(suitcase_id, Some(id)).is_some()
        {
            return Err(pending_conflict());
        }

        Ok(tables.settlements.get_mut(&id).map(|s| {
            s.status = status;
            s.updated_at = Utc::now();
            s.clone()
        }))
    }

    async fn set_receipt(&self, id: Uuid, url: &str, digest: &str) -> AppResult<()> {
        let mut tables = self.tables()?;
        let settlement = tables
            .settlements
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Settlement".to_string()))?;
        settlement.receipt_url = Some(url.to_string());
        settlement.receipt_digest = Some(digest.to_string());
        settlement.updated_at = Utc::now();
        Ok(())
    }

    async fn get_settlement(&self, id: Uuid) -> AppResult<Option<Settlement>> {
        Ok(self.tables()?.settlements.get(&id).cloned())
    }

    async fn list_settlements(&self, filter: &SettlementFilter) -> AppResult<Vec<Settlement>> {
        let tables = self.tables()?;
        let mut settlements: Vec<Settlement> = tables
            .settlements
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        settlements.sort_by(|a, b| {
            b.settlement_date
                .cmp(&a.settlement_date)
                .then(b.created_at.cmp(&a.created_at))
        });

        Ok(settlements
            .into_iter()
            .skip(filter.page.offset as usize)
            .take(filter.page.limit as usize)
            .collect())
    }

    async fn delete_settlement(&self, id: Uuid) -> AppResult<bool> {
        self.check(FailPoint::DeleteSettlement)?;
        Ok(self.tables()?.settlements.remove(&id).is_some())
    }

    async fn insert_sold_item(&self, new: NewSoldItemRecord) -> AppResult<SoldItemRecord> {
        self.check(FailPoint::InsertSoldItem)?;
        let record = SoldItemRecord {
            id: Uuid::new_v4(),
            settlement_id: new.settlement_id,
            suitcase_item_id: new.suitcase_item_id,
            inventory_id: new.inventory_id,
            price: new.price,
            quantity: new.quantity,
            customer_name: new.customer_name,
            payment_method: new.payment_method,
            voided_at: None,
            created_at: Utc::now(),
        };
        self.tables()?.sold_items.push(record.clone());
        Ok(record)
    }

    async fn list_sold_items(&self, settlement_id: Uuid) -> AppResult<Vec<SoldItemRecord>> {
        Ok(self
            .tables()?
            .sold_items
            .iter()
            .filter(|r| r.settlement_id == settlement_id)
            .cloned()
            .collect())
    }

    async fn delete_sold_item(&self, id: Uuid) -> AppResult<()> {
        self.tables()?.sold_items.retain(|r| r.id != id);
        Ok(())
    }

    async fn purge_sold_items(&self, settlement_id: Uuid) -> AppResult<u64> {
        let mut tables = self.tables()?;
        let before = tables.sold_items.len();
        tables.sold_items.retain(|r| r.settlement_id != settlement_id);
        Ok((before - tables.sold_items.len()) as u64)
    }

    async fn void_sold_items(&self, settlement_id: Uuid, at: DateTime<Utc>) -> AppResult<u64> {
        let mut tables = self.tables()?;
        let mut voided = 0;
        for record in tables
            .sold_items
            .iter_mut()
            .filter(|r| r.settlement_id == settlement_id && r.voided_at.is_none())
        {
            record.voided_at = Some(at);
            voided += 1;
        }
        Ok(voided)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.tables().map(|_| ())
    }
}
