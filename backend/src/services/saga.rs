//! Compensation log for multi-record workflows
//!
//! Storage calls made by a workflow commit one by one. Each successful call
//! that must be undone if a later step fails records its compensation here;
//! on failure the log is unwound newest-first. Unwinding is best effort: a
//! compensation that itself fails is logged and the rest still run.

use uuid::Uuid;

use shared::{ItemStatus, Settlement, TransitionKind};

use crate::store::{SettlementUpdate, Store};

/// Undo action for one committed step
#[derive(Debug, Clone, PartialEq)]
pub enum Compensation {
    /// Move an item back from `from` to `to` (compare-and-set)
    RevertItemStatus {
        item_id: Uuid,
        from: ItemStatus,
        to: ItemStatus,
    },
    DeleteSoldItem {
        record_id: Uuid,
    },
    DeleteSettlement {
        settlement_id: Uuid,
    },
    /// Put a pending settlement's fields back the way they were
    RestoreSettlement {
        previous: Box<Settlement>,
    },
    /// Return units taken from the inventory ledger
    RestoreInventory {
        inventory_id: Uuid,
        quantity: i32,
    },
}

/// Ordered record of compensations for one workflow run
#[derive(Debug)]
pub struct CompensationLog {
    workflow: &'static str,
    steps: Vec<Compensation>,
}

/// What happened during an unwind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnwindReport {
    pub applied: usize,
    pub failed: usize,
}

impl CompensationLog {
    pub fn new(workflow: &'static str) -> Self {
        Self {
            workflow,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, compensation: Compensation) {
        self.steps.push(compensation);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Compensation] {
        &self.steps
    }

    /// Run every recorded compensation, newest first
    pub async fn unwind(self, store: &dyn Store) -> UnwindReport {
        let mut report = UnwindReport::default();

        for step in self.steps.into_iter().rev() {
            match apply(store, &step).await {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::error!(
                        workflow = self.workflow,
                        compensation = ?step,
                        error = %err,
                        "Compensation failed; manual repair needed"
                    );
                }
            }
        }

        if report.failed == 0 {
            tracing::info!(
                workflow = self.workflow,
                applied = report.applied,
                "Workflow rolled back"
            );
        }

        report
    }
}

async fn apply(store: &dyn Store, step: &Compensation) -> crate::error::AppResult<()> {
    match step {
        Compensation::RevertItemStatus { item_id, from, to } => {
            from.transition(*to, TransitionKind::Reversal)?;
            if !store.compare_and_set_item_status(*item_id, *from, *to).await? {
                tracing::warn!(item_id = %item_id, "Item already moved on; status not reverted");
            }
        }
        Compensation::DeleteSoldItem { record_id } => {
            store.delete_sold_item(*record_id).await?;
        }
        Compensation::DeleteSettlement { settlement_id } => {
            store.delete_settlement(*settlement_id).await?;
        }
        Compensation::RestoreSettlement { previous } => {
            store
                .update_settlement(previous.id, SettlementUpdate::from(previous.as_ref()))
                .await?;
        }
        Compensation::RestoreInventory {
            inventory_id,
            quantity,
        } => {
            store.adjust_quantity(*inventory_id, *quantity).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailPoint, InMemoryStore, NewSuitcaseItem, SuitcaseStore};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_unwind_runs_newest_first() {
        let store = InMemoryStore::new();
        let seller = store.add_seller("Bia", None).unwrap();
        let suitcase = store.add_suitcase("MAL-07", seller.id).unwrap();
        let stock = store
            .add_inventory_item("ANEL-03", Decimal::from(25), 4)
            .unwrap();
        let item = store
            .insert_suitcase_item(NewSuitcaseItem {
                suitcase_id: suitcase.id,
                inventory_id: stock.id,
                quantity: 1,
            })
            .await
            .unwrap();

        // Item is Sold; unwinding should put it back and return stock
        store
            .compare_and_set_item_status(item.id, ItemStatus::InPossession, ItemStatus::Sold)
            .await
            .unwrap();

        let mut log = CompensationLog::new("test");
        log.record(Compensation::RestoreInventory {
            inventory_id: stock.id,
            quantity: 2,
        });
        log.record(Compensation::RevertItemStatus {
            item_id: item.id,
            from: ItemStatus::Sold,
            to: ItemStatus::InPossession,
        });
        assert_eq!(log.len(), 2);

        let report = log.unwind(&store).await;
        assert_eq!(report, UnwindReport { applied: 2, failed: 0 });

        let reverted = store.get_suitcase_item(item.id).await.unwrap().unwrap();
        assert_eq!(reverted.status, ItemStatus::InPossession);
        assert_eq!(store.inventory_quantity(stock.id).unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_failed_compensation_does_not_stop_unwind() {
        let store = InMemoryStore::new();
        let stock = store
            .add_inventory_item("PULSEIRA-9", Decimal::from(12), 0)
            .unwrap();
        store.fail_next(FailPoint::DeleteSettlement, 1);

        let mut log = CompensationLog::new("test");
        log.record(Compensation::RestoreInventory {
            inventory_id: stock.id,
            quantity: 1,
        });
        log.record(Compensation::DeleteSettlement {
            settlement_id: Uuid::new_v4(),
        });

        let report = log.unwind(&store).await;
        assert_eq!(report, UnwindReport { applied: 1, failed: 1 });
        assert_eq!(store.inventory_quantity(stock.id).unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_revert_outside_reversal_edge_is_refused() {
        let store = InMemoryStore::new();
        let seller = store.add_seller("Bia", None).unwrap();
        let suitcase = store.add_suitcase("MAL-08", seller.id).unwrap();
        let stock = store
            .add_inventory_item("ANEL-04", Decimal::from(25), 4)
            .unwrap();
        let item = store
            .insert_suitcase_item(NewSuitcaseItem {
                suitcase_id: suitcase.id,
                inventory_id: stock.id,
                quantity: 1,
            })
            .await
            .unwrap();
        store
            .compare_and_set_item_status(item.id, ItemStatus::InPossession, ItemStatus::Lost)
            .await
            .unwrap();

        let mut log = CompensationLog::new("test");
        log.record(Compensation::RevertItemStatus {
            item_id: item.id,
            from: ItemStatus::Lost,
            to: ItemStatus::InPossession,
        });

        let report = log.unwind(&store).await;
        assert_eq!(report, UnwindReport { applied: 0, failed: 1 });
        let current = store.get_suitcase_item(item.id).await.unwrap().unwrap();
        assert_eq!(current.status, ItemStatus::Lost);
    }

    #[test]
    fn test_empty_log() {
        let log = CompensationLog::new("noop");
        assert!(log.is_empty());
        assert!(log.steps().is_empty());
    }
}
