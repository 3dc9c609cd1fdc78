//! Post-settlement cleanup of suitcase contents
//!
//! After a settlement the suitcase is physically emptied: items still in
//! possession go back to the warehouse and every item row is removed.
//! Cleanup is idempotent and can be re-run after any partial failure.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use shared::ItemStatus;

use crate::error::{AppError, AppResult};
use crate::services::locks::SuitcaseLocks;
use crate::store::Store;

/// Reconciliation cleanup service
#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn Store>,
    locks: SuitcaseLocks,
    attempts: u32,
}

/// What one cleanup run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub suitcase_id: Uuid,
    /// Items moved back to stock before deletion
    pub returned_to_stock: u32,
    pub deleted: u64,
    /// Rounds needed to reach an empty suitcase; zero if it was already empty
    pub rounds: u32,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn Store>, locks: SuitcaseLocks, attempts: u32) -> Self {
        Self {
            store,
            locks,
            attempts: attempts.max(1),
        }
    }

    /// Empty a suitcase, failing with `NotFound` if it does not exist
    pub async fn reconcile_suitcase(&self, suitcase_id: Uuid) -> AppResult<CleanupReport> {
        let _slot = self.locks.acquire(suitcase_id).await;
        self.store
            .get_suitcase(suitcase_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Suitcase".to_string()))?;

        self.cleanup(suitcase_id).await
    }

    /// Remove every item still attached to the suitcase.
    /// Callers hold the suitcase slot.
    pub async fn cleanup(&self, suitcase_id: Uuid) -> AppResult<CleanupReport> {
        let mut report = CleanupReport {
            suitcase_id,
            ..Default::default()
        };

        for round in 1..=self.attempts {
            match self.cleanup_round(suitcase_id, &mut report).await {
                Ok(0) if round == 1 && report.deleted == 0 => {
                    tracing::debug!(suitcase_id = %suitcase_id, "Suitcase already empty");
                    return Ok(report);
                }
                Ok(0) => {
                    report.rounds = round;
                    tracing::info!(
                        suitcase_id = %suitcase_id,
                        rounds = round,
                        returned = report.returned_to_stock,
                        deleted = report.deleted,
                        "Suitcase emptied"
                    );
                    return Ok(report);
                }
                Ok(remaining) => {
                    tracing::warn!(
                        suitcase_id = %suitcase_id,
                        round,
                        remaining,
                        "Items still attached after cleanup round"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        suitcase_id = %suitcase_id,
                        round,
                        error = %err,
                        "Cleanup round failed"
                    );
                }
            }
        }

        let remaining = self.store.count_suitcase_items(suitcase_id).await?;
        if remaining == 0 {
            report.rounds = self.attempts;
            return Ok(report);
        }

        tracing::error!(
            suitcase_id = %suitcase_id,
            remaining,
            attempts = self.attempts,
            "Cleanup gave up with items still attached"
        );
        Err(AppError::InconsistentCleanup {
            suitcase_id,
            remaining,
        })
    }

    /// One list/return/delete/count pass; returns how many items remain
    async fn cleanup_round(&self, suitcase_id: Uuid, report: &mut CleanupReport) -> AppResult<i64> {
        let items = self.store.list_suitcase_items(suitcase_id, None).await?;
        if items.is_empty() {
            return Ok(0);
        }

        // Stock first, so a failed delete never strands checked-out units
        for item in items.iter().filter(|i| i.status == ItemStatus::InPossession) {
            if self.store.return_item_to_stock(item.id).await? {
                report.returned_to_stock += 1;
            }
        }

        report.deleted += self.store.delete_suitcase_items(suitcase_id).await?;
        self.store.count_suitcase_items(suitcase_id).await
    }
}
