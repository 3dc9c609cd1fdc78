//! Shared types and models for the consignment settlement platform
//!
//! This crate contains the domain models, the suitcase item state machine
//! and the commission calculator used by the backend and any other client.

pub mod commission;
pub mod models;
pub mod types;
pub mod validation;

pub use commission::*;
pub use models::*;
pub use types::*;
pub use validation::*;
