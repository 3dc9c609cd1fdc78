//! Business logic services for the consignment settlement platform

pub mod authorization;
pub mod locks;
pub mod receipt;
pub mod reconciliation;
pub mod saga;
pub mod settlement;
pub mod suitcase_item;

pub use authorization::{AdminCheck, PgAdminCheck, StaticAdminCheck};
pub use locks::SuitcaseLocks;
pub use receipt::{CsvReceiptRenderer, ReceiptRenderer};
pub use reconciliation::ReconciliationService;
pub use settlement::SettlementService;
pub use suitcase_item::SuitcaseItemService;
