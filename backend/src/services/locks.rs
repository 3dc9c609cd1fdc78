//! Per-suitcase mutual exclusion
//!
//! Settlement, reversal, status changes and standalone reconciliation all
//! read a suitcase's items or settlements and then write several records. Holding the suitcase's slot for the whole workflow keeps
//! two requests for the same suitcase from interleaving in this process; the
//! partial unique index on pending settlements covers other processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Registry of per-suitcase locks
#[derive(Debug, Clone, Default)]
pub struct SuitcaseLocks {
    slots: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Exclusive ownership of one suitcase's settlement slot
#[derive(Debug)]
pub struct SuitcaseGuard {
    suitcase_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl SuitcaseGuard {
    pub fn suitcase_id(&self) -> Uuid {
        self.suitcase_id
    }
}

impl SuitcaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the slot for `suitcase_id`
    pub async fn acquire(&self, suitcase_id: Uuid) -> SuitcaseGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop slots nobody holds or waits on
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(suitcase_id).or_default())
        };

        let guard = slot.lock_owned().await;
        SuitcaseGuard {
            suitcase_id,
            _guard: guard,
        }
    }

    /// Number of suitcases with a live slot
    pub fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}
