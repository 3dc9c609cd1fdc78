//! Domain models for the consignment settlement platform

mod inventory;
mod settlement;
mod suitcase;
mod suitcase_item;

pub use inventory::*;
pub use settlement::*;
pub use suitcase::*;
pub use suitcase_item::*;
