//! HTTP handlers

pub mod health;
pub mod settlement;
pub mod suitcase;

pub use health::health_check;
pub use settlement::*;
pub use suitcase::*;
