//! Settlement (acerto) service
//!
//! A settlement compares the items a suitcase was carrying with the ones the
//! seller brought back. Anything not confirmed present is treated as sold:
//! it is marked `sold`, recorded in the sold-item ledger and billed at its
//! unit price. The suitcase is then emptied for fresh stock.
//!
//! The records involved live in separate collections and are written one
//! call at a time. The settlement and sold-item writes are tracked in a
//! compensation log and rolled back if any of them fails.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::{
    CommissionCalculator, CommissionSummary, ItemStatus, Settlement, SettlementDetails,
    SettlementStatus, SuitcaseItem, TransitionKind,
};

use crate::config::{SettlementConfig, SoldItemPolicy};
use crate::error::{AppError, AppResult};
use crate::services::authorization::AdminCheck;
use crate::services::locks::SuitcaseLocks;
use crate::services::receipt::ReceiptRenderer;
use crate::services::reconciliation::ReconciliationService;
use crate::services::saga::{Compensation, CompensationLog};
use crate::store::{
    NewSettlement, NewSoldItemRecord, RestoreOutcome, RestoredItem, SettlementFilter,
    SettlementUpdate, Store,
};

/// Settlement service
#[derive(Clone)]
pub struct SettlementService {
    store: Arc<dyn Store>,
    locks: SuitcaseLocks,
    admin_check: Arc<dyn AdminCheck>,
    receipts: Arc<dyn ReceiptRenderer>,
    calculator: CommissionCalculator,
    reconciliation: ReconciliationService,
    sold_item_policy: SoldItemPolicy,
}

/// Input for settling a suitcase
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSettlementInput {
    pub suitcase_id: Uuid,
    pub seller_id: Uuid,
    pub settlement_date: NaiveDate,
    pub next_settlement_date: Option<NaiveDate>,
    /// Items scanned as still in the suitcase
    #[serde(default)]
    #[validate(length(max = 2000, message = "Too many items in one settlement"))]
    pub items_present: Vec<Uuid>,
}

/// Input for changing a settlement's status
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettlementStatusInput {
    pub status: SettlementStatus,
}

/// Tally of item restores during a reversal
#[derive(Debug, Default)]
struct ReversalSummary {
    restored: u32,
    reattached: u32,
    skipped: u32,
}

/// Which in-possession items were sold and which stay
#[derive(Debug)]
struct SettlementPlan {
    sold: Vec<SuitcaseItem>,
    kept: usize,
    /// Present ids that did not match any in-possession item
    unmatched: Vec<Uuid>,
}

impl SettlementPlan {
    /// Everything in possession that was not confirmed present is sold
    fn build(in_possession: Vec<SuitcaseItem>, items_present: &[Uuid]) -> Self {
        let present: HashSet<Uuid> = items_present.iter().copied().collect();
        let known: HashSet<Uuid> = in_possession.iter().map(|i| i.id).collect();

        let (kept, sold): (Vec<_>, Vec<_>) = in_possession
            .into_iter()
            .partition(|item| present.contains(&item.id));

        let mut unmatched: Vec<Uuid> = present.difference(&known).copied().collect();
        unmatched.sort();

        Self {
            sold,
            kept: kept.len(),
            unmatched,
        }
    }
}

impl SettlementService {
    pub fn new(
        store: Arc<dyn Store>,
        locks: SuitcaseLocks,
        admin_check: Arc<dyn AdminCheck>,
        receipts: Arc<dyn ReceiptRenderer>,
        settings: &SettlementConfig,
    ) -> Self {
        Self {
            reconciliation: ReconciliationService::new(
                store.clone(),
                locks.clone(),
                settings.cleanup_attempts,
            ),
            calculator: CommissionCalculator::new(settings.default_commission_rate),
            sold_item_policy: settings.sold_item_policy,
            store,
            locks,
            admin_check,
            receipts,
        }
    }

    /// Settle a suitcase against the items confirmed present
    pub async fn create_settlement(
        &self,
        input: CreateSettlementInput,
    ) -> AppResult<SettlementDetails> {
        input.validate()?;
        shared::validate_settlement_dates(input.settlement_date, input.next_settlement_date)
            .map_err(|msg| {
                AppError::validation(
                    "next_settlement_date",
                    msg,
                    "A próxima data de acerto não pode ser anterior à data do acerto",
                )
            })?;

        let suitcase_id = input.suitcase_id;
        let _slot = self.locks.acquire(suitcase_id).await;

        // 1. Suitcase and seller
        let suitcase = self
            .store
            .get_suitcase(suitcase_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Suitcase".to_string()))?;
        let seller = self
            .store
            .get_seller(input.seller_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Seller".to_string()))?;

        if suitcase.seller_id != seller.id {
            tracing::warn!(
                suitcase_id = %suitcase_id,
                assigned_seller = %suitcase.seller_id,
                settling_seller = %seller.id,
                "Suitcase settled by a seller other than its assignee"
            );
        }

        // 2-3. Snapshot and sold set
        let in_possession = self
            .store
            .list_suitcase_items(suitcase_id, Some(ItemStatus::InPossession))
            .await?;
        let plan = SettlementPlan::build(in_possession, &input.items_present);

        if !plan.unmatched.is_empty() {
            tracing::warn!(
                suitcase_id = %suitcase_id,
                unmatched = ?plan.unmatched,
                "Ignoring present items that are not in possession of the suitcase"
            );
        }

        // 4. Totals
        let prices = self.unit_prices(&plan.sold).await?;
        let summary = self.calculator.calculate(
            plan.sold.iter().map(|item| prices[&item.inventory_id]),
            seller.commission_rate,
        );

        tracing::info!(
            suitcase_id = %suitcase_id,
            sold = summary.items_sold,
            kept = plan.kept,
            total_sales = %summary.total_sales,
            commission = %summary.commission_amount,
            "Settlement computed"
        );

        // 5-6. Financial records, rolled back together on failure
        let mut log = CompensationLog::new("create_settlement");
        let settlement = match self
            .write_settlement(&input, &summary, &plan, &prices, &mut log)
            .await
        {
            Ok(settlement) => settlement,
            Err(err) => {
                tracing::error!(
                    suitcase_id = %suitcase_id,
                    error = %err,
                    steps = log.len(),
                    "Settlement failed; compensating"
                );
                log.unwind(self.store.as_ref()).await;
                return Err(err);
            }
        };

        // 7. Schedule
        if let Some(next) = input.next_settlement_date {
            if let Err(err) = self.store.set_next_settlement_date(suitcase_id, next).await {
                tracing::error!(
                    suitcase_id = %suitcase_id,
                    settlement_id = %settlement.id,
                    error = %err,
                    "Settlement recorded but next settlement date was not saved"
                );
                return Err(err);
            }
        }

        // 8. Empty the suitcase; leftovers are picked up by a later reconcile
        if let Err(err) = self.reconciliation.cleanup(suitcase_id).await {
            tracing::warn!(
                suitcase_id = %suitcase_id,
                settlement_id = %settlement.id,
                error = %err,
                "Settlement recorded but suitcase cleanup is incomplete"
            );
        }

        // 9. Durable state
        self.get_settlement_by_id(settlement.id).await
    }

    /// Reverse a settlement; only administrators may do this.
    ///
    /// Returns false when the settlement no longer exists. Not atomic, but
    /// safe to retry after a partial failure.
    pub async fn delete_settlement(&self, actor_id: Uuid, settlement_id: Uuid) -> AppResult<bool> {
        if !self.admin_check.is_admin(actor_id).await? {
            tracing::warn!(
                actor_id = %actor_id,
                settlement_id = %settlement_id,
                "Non-admin attempted to reverse a settlement"
            );
            return Err(AppError::PermissionDenied("delete settlements".to_string()));
        }

        let Some(found) = self.store.get_settlement(settlement_id).await? else {
            tracing::info!(settlement_id = %settlement_id, "Settlement already gone");
            return Ok(false);
        };

        let _slot = self.locks.acquire(found.suitcase_id).await;
        // Re-read under the suitcase slot
        let Some(settlement) = self.store.get_settlement(settlement_id).await? else {
            return Ok(false);
        };

        let records = self.store.list_sold_items(settlement_id).await?;
        let mut summary = ReversalSummary::default();

        if settlement.status == SettlementStatus::Completed {
            for record in records.iter().filter(|r| r.voided_at.is_none()) {
                let outcome = self
                    .store
                    .restore_suitcase_item(RestoredItem {
                        id: record.suitcase_item_id,
                        suitcase_id: settlement.suitcase_id,
                        inventory_id: record.inventory_id,
                        quantity: record.quantity,
                    })
                    .await
                    .map_err(|err| {
                        tracing::error!(
                            settlement_id = %settlement_id,
                            item_id = %record.suitcase_item_id,
                            restored = summary.restored + summary.reattached,
                            error = %err,
                            "Reversal interrupted; retry to finish restoring items"
                        );
                        err
                    })?;

                match outcome {
                    RestoreOutcome::Restored => summary.restored += 1,
                    RestoreOutcome::Reattached => summary.reattached += 1,
                    RestoreOutcome::AlreadyInPossession => {}
                    RestoreOutcome::Skipped(status) => {
                        summary.skipped += 1;
                        tracing::warn!(
                            settlement_id = %settlement_id,
                            item_id = %record.suitcase_item_id,
                            status = %status,
                            "Sold item has since moved on; not restored"
                        );
                    }
                }
            }
        }

        match self.sold_item_policy {
            SoldItemPolicy::Purge => {
                self.store.purge_sold_items(settlement_id).await?;
            }
            SoldItemPolicy::Void => {
                self.store.void_sold_items(settlement_id, Utc::now()).await?;
            }
        }

        let deleted = self.store.delete_settlement(settlement_id).await?;

        tracing::info!(
            actor_id = %actor_id,
            settlement_id = %settlement_id,
            suitcase_id = %settlement.suitcase_id,
            restored = summary.restored,
            reattached = summary.reattached,
            skipped = summary.skipped,
            policy = ?self.sold_item_policy,
            "Settlement reversed"
        );

        Ok(deleted)
    }

    /// Change a settlement's status
    pub async fn update_settlement_status(
        &self,
        settlement_id: Uuid,
        input: UpdateSettlementStatusInput,
    ) -> AppResult<Settlement> {
        let found = self
            .store
            .get_settlement(settlement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Settlement".to_string()))?;

        let _slot = self.locks.acquire(found.suitcase_id).await;
        let current = self
            .store
            .get_settlement(settlement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Settlement".to_string()))?;

        if !current.status.can_transition_to(input.status) {
            tracing::warn!(
                settlement_id = %settlement_id,
                from = %current.status,
                to = %input.status,
                "Refused settlement status change"
            );
            return Err(AppError::Conflict {
                resource: "settlement".to_string(),
                message: "A completed settlement cannot be reopened".to_string(),
                message_pt: "Um acerto concluído não pode ser reaberto".to_string(),
            });
        }

        let settlement = self
            .store
            .set_settlement_status(settlement_id, input.status)
            .await?
            .ok_or_else(|| AppError::NotFound("Settlement".to_string()))?;

        tracing::info!(
            settlement_id = %settlement_id,
            status = %settlement.status,
            "Settlement status updated"
        );
        Ok(settlement)
    }

    /// List settlements, newest first
    pub async fn list_settlements(&self, filter: SettlementFilter) -> AppResult<Vec<Settlement>> {
        shared::validate_date_window(filter.from, filter.to).map_err(|msg| {
            AppError::validation(
                "from",
                msg,
                "A data inicial não pode ser posterior à data final",
            )
        })?;

        self.store.list_settlements(&filter).await
    }

    /// A settlement with its sold-item records
    pub async fn get_settlement_by_id(&self, settlement_id: Uuid) -> AppResult<SettlementDetails> {
        let settlement = self
            .store
            .get_settlement(settlement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Settlement".to_string()))?;
        let sold_items = self.store.list_sold_items(settlement_id).await?;

        Ok(SettlementDetails {
            settlement,
            sold_items,
        })
    }

    /// Render the receipt and store its URL and digest on the settlement
    pub async fn generate_receipt(&self, settlement_id: Uuid) -> AppResult<Settlement> {
        let details = self.get_settlement_by_id(settlement_id).await?;
        let receipt = self.receipts.render(&details).await?;
        let digest = receipt.digest();

        self.store
            .set_receipt(settlement_id, &receipt.url, &digest)
            .await?;

        tracing::info!(
            settlement_id = %settlement_id,
            url = %receipt.url,
            digest = %digest,
            "Receipt generated"
        );

        self.store
            .get_settlement(settlement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Settlement".to_string()))
    }

    /// Unit price of every inventory item referenced by `items`
    async fn unit_prices(&self, items: &[SuitcaseItem]) -> AppResult<HashMap<Uuid, Decimal>> {
        let mut ids: Vec<Uuid> = items.iter().map(|i| i.inventory_id).collect();
        ids.sort();
        ids.dedup();

        let prices: HashMap<Uuid, Decimal> = self
            .store
            .get_inventory_items(&ids)
            .await?
            .into_iter()
            .map(|inv| (inv.id, inv.price))
            .collect();

        if let Some(missing) = ids.iter().find(|id| !prices.contains_key(id)) {
            return Err(AppError::NotFound(format!("Inventory item {}", missing)));
        }

        Ok(prices)
    }

    /// Steps 5 and 6: settlement row, item statuses and sold-item records
    async fn write_settlement(
        &self,
        input: &CreateSettlementInput,
        summary: &CommissionSummary,
        plan: &SettlementPlan,
        prices: &HashMap<Uuid, Decimal>,
        log: &mut CompensationLog,
    ) -> AppResult<Settlement> {
        let settlement = match self.store.find_pending_settlement(input.suitcase_id).await? {
            Some(previous) => {
                let updated = self
                    .store
                    .update_settlement(
                        previous.id,
                        SettlementUpdate {
                            seller_id: input.seller_id,
                            settlement_date: input.settlement_date,
                            next_settlement_date: input.next_settlement_date,
                            total_sales: summary.total_sales,
                            commission_amount: summary.commission_amount,
                            status: SettlementStatus::Completed,
                        },
                    )
                    .await?;
                tracing::debug!(settlement_id = %updated.id, "Completed pending settlement");
                log.record(Compensation::RestoreSettlement {
                    previous: Box::new(previous),
                });
                updated
            }
            None => {
                let created = self
                    .store
                    .insert_settlement(NewSettlement {
                        suitcase_id: input.suitcase_id,
                        seller_id: input.seller_id,
                        settlement_date: input.settlement_date,
                        next_settlement_date: input.next_settlement_date,
                        total_sales: summary.total_sales,
                        commission_amount: summary.commission_amount,
                        status: SettlementStatus::Completed,
                    })
                    .await?;
                log.record(Compensation::DeleteSettlement {
                    settlement_id: created.id,
                });
                created
            }
        };

        for item in &plan.sold {
            item.status.transition(ItemStatus::Sold, TransitionKind::Forward)?;
            if !self
                .store
                .compare_and_set_item_status(item.id, ItemStatus::InPossession, ItemStatus::Sold)
                .await?
            {
                return Err(AppError::InvalidItemState(format!(
                    "suitcase item {} left possession during the settlement",
                    item.id
                )));
            }
            log.record(Compensation::RevertItemStatus {
                item_id: item.id,
                from: ItemStatus::Sold,
                to: ItemStatus::InPossession,
            });

            let annotation = self.store.sale_annotation(item.id).await?;
            let record = self
                .store
                .insert_sold_item(NewSoldItemRecord {
                    settlement_id: settlement.id,
                    suitcase_item_id: item.id,
                    inventory_id: item.inventory_id,
                    price: prices[&item.inventory_id],
                    quantity: item.quantity,
                    customer_name: annotation.as_ref().and_then(|a| a.customer_name.clone()),
                    payment_method: annotation.and_then(|a| a.payment_method),
                })
                .await?;
            log.record(Compensation::DeleteSoldItem {
                record_id: record.id,
            });
        }

        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Uuid) -> SuitcaseItem {
        SuitcaseItem {
            id,
            suitcase_id: Uuid::nil(),
            inventory_id: Uuid::new_v4(),
            quantity: 1,
            status: ItemStatus::InPossession,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_sells_everything_not_present() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let plan = SettlementPlan::build(ids.iter().copied().map(item).collect(), &ids[..1]);

        let sold: HashSet<Uuid> = plan.sold.iter().map(|i| i.id).collect();
        assert_eq!(sold, ids[1..].iter().copied().collect());
        assert_eq!(plan.kept, 1);
        assert!(plan.unmatched.is_empty());
    }

    #[test]
    fn test_plan_with_nothing_present_sells_all() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let plan = SettlementPlan::build(ids.iter().copied().map(item).collect(), &[]);

        assert_eq!(plan.sold.len(), 4);
        assert_eq!(plan.kept, 0);
    }

    #[test]
    fn test_plan_ignores_unknown_and_duplicate_present_ids() {
        let known = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let plan = SettlementPlan::build(vec![item(known)], &[known, known, stranger]);

        assert!(plan.sold.is_empty());
        assert_eq!(plan.kept, 1);
        assert_eq!(plan.unmatched, vec![stranger]);
    }

    #[test]
    fn test_plan_on_empty_suitcase() {
        let plan = SettlementPlan::build(Vec::new(), &[Uuid::new_v4()]);
        assert!(plan.sold.is_empty());
        assert_eq!(plan.unmatched.len(), 1);
    }
}
