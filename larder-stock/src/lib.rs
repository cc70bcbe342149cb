//! # larder-stock
//!
//! Inventory reconciliation core:
//! - Canonical ingredient-name resolution with a pluggable normalization oracle
//! - Transactional stock mutation (ADD/USE) with an append-only audit trail
//! - Stock queries with substring fuzzy fallback
//! - Bulk clearing

pub mod resolver;
pub mod store;
pub mod types;

pub use store::{BatchOutcome, InventoryStore, StockAnswer};
pub use types::{ChangeRequest, ItemChange, StockAction};
