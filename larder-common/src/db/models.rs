//! Database row models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `inventory` table: the current stock level for a single
/// canonical item name. At most one row exists per canonical name.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryEntry {
    pub id: i64,
    pub item_name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub last_updated_by: String,
}

/// One row of the append-only `transaction_log` table.
///
/// Positive `quantity_change` records an addition, negative records
/// consumption or clearing. Rows are never updated or deleted; the log is the
/// source of truth for what happened, and the inventory table is the
/// materialized current-state view.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionLogEntry {
    pub id: i64,
    pub item_name: String,
    pub quantity_change: f64,
    pub user_name: String,
    pub transaction_time: DateTime<Utc>,
}

/// Listing projection for stock queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockLine {
    pub item_name: String,
    pub quantity: f64,
    pub unit: Option<String>,
}
