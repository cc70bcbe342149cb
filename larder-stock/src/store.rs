//! Inventory store: transactional stock mutation, queries, and bulk clear
//!
//! All operations run against a shared `SqlitePool` owned by the store. Each
//! multi-item batch executes inside a single transaction so inventory rows
//! and their audit log entries commit or roll back together.

use crate::resolver::{self, Normalizer};
use crate::types::{ItemChange, StockAction};
use chrono::{DateTime, Utc};
use larder_common::db::models::{StockLine, TransactionLogEntry};
use larder_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Outcome of a successfully committed ADD/USE batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Number of items whose inventory row was inserted or updated
    pub applied: usize,
    /// USE items skipped because no inventory row exists for them
    pub skipped: Vec<String>,
}

/// Answer to a single-item stock query
#[derive(Debug, Clone, PartialEq)]
pub enum StockAnswer {
    /// The queried name matched an inventory row exactly
    Exact {
        name: String,
        quantity: f64,
        unit: Option<String>,
    },
    /// No exact match, but a stored name related by substring was found
    Suggestion {
        query: String,
        name: String,
        quantity: f64,
        unit: Option<String>,
    },
    /// Nothing in stock resembles the queried name
    NotFound { query: String },
}

/// Data-access object for the inventory and transaction_log tables
#[derive(Debug, Clone)]
pub struct InventoryStore {
    pool: SqlitePool,
}

impl InventoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply an ADD/USE batch atomically.
    ///
    /// Item names should already be canonical (see
    /// [`resolver::resolve_name`]); they are stored lowercase.
    ///
    /// ADD inserts a new row or adds to the existing quantity. USE subtracts
    /// clamped at zero; a USE for an item with no inventory row is skipped
    /// and reported in the outcome rather than failing the batch. Every
    /// applied change appends exactly one transaction_log row inside the
    /// same transaction. For USE the log records the requested amount, not
    /// the clamped delta, preserving what the user said they consumed.
    pub async fn apply_changes(
        &self,
        action: StockAction,
        items: &[ItemChange],
        actor: &str,
    ) -> Result<BatchOutcome> {
        info!("Applying {} batch of {} items by {}", action, items.len(), actor);

        let mut tx = self.pool.begin().await?;
        let mut outcome = BatchOutcome::default();

        for item in items {
            let item_name = item.name.trim().to_lowercase();
            let quantity = item.quantity;
            let now = Utc::now();

            let current: Option<f64> =
                sqlx::query_scalar("SELECT quantity FROM inventory WHERE item_name = ?")
                    .bind(&item_name)
                    .fetch_optional(&mut *tx)
                    .await?;

            match action {
                StockAction::Add => {
                    match current {
                        None => {
                            sqlx::query(
                                "INSERT INTO inventory (item_name, quantity, unit, last_updated, last_updated_by)
                                 VALUES (?, ?, ?, ?, ?)",
                            )
                            .bind(&item_name)
                            .bind(quantity)
                            .bind(&item.unit)
                            .bind(now)
                            .bind(actor)
                            .execute(&mut *tx)
                            .await?;
                            info!("Inserted {} {} of '{}' by {}", quantity, item.unit, item_name, actor);
                        }
                        Some(old) => {
                            let new_quantity = old + quantity;
                            sqlx::query(
                                "UPDATE inventory SET quantity = ?, last_updated = ?, last_updated_by = ?
                                 WHERE item_name = ?",
                            )
                            .bind(new_quantity)
                            .bind(now)
                            .bind(actor)
                            .bind(&item_name)
                            .execute(&mut *tx)
                            .await?;
                            info!("Added {} to '{}', new total {} by {}", quantity, item_name, new_quantity, actor);
                        }
                    }
                    log_change(&mut tx, &item_name, quantity, actor, now).await?;
                    outcome.applied += 1;
                }
                StockAction::Use => {
                    let Some(old) = current else {
                        warn!("Attempted to USE non-existent item '{}' by {}", item_name, actor);
                        outcome.skipped.push(item_name);
                        continue;
                    };

                    let new_quantity = (old - quantity).max(0.0);
                    sqlx::query(
                        "UPDATE inventory SET quantity = ?, last_updated = ?, last_updated_by = ?
                         WHERE item_name = ?",
                    )
                    .bind(new_quantity)
                    .bind(now)
                    .bind(actor)
                    .bind(&item_name)
                    .execute(&mut *tx)
                    .await?;

                    // The log keeps the requested amount, not the clamped delta
                    log_change(&mut tx, &item_name, -quantity, actor, now).await?;
                    outcome.applied += 1;
                    info!("Used {} of '{}', new total {} by {}", quantity, item_name, new_quantity, actor);
                }
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Distinct canonical names with stock on hand, for name resolution
    pub async fn distinct_item_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT item_name FROM inventory WHERE quantity > 0 ORDER BY item_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Resolve a raw ingredient name to its canonical stored spelling.
    ///
    /// Fetches the distinct in-stock names and delegates to
    /// [`resolver::resolve_name`].
    pub async fn resolve_name<N: Normalizer>(
        &self,
        candidate: &str,
        normalizer: Option<&N>,
    ) -> Result<String> {
        let existing = self.distinct_item_names().await?;
        Ok(resolver::resolve_name(candidate, &existing, normalizer))
    }

    /// Report the stock level for one item.
    ///
    /// Falls back to a substring scan over in-stock rows when the exact
    /// lookup misses; the first related name in alphabetical order is
    /// offered as a suggestion. The relation is checked in both directions
    /// ("sapi" suggests "daging sapi"), which trades precision for recall on
    /// short names.
    pub async fn query_item(&self, name: &str) -> Result<StockAnswer> {
        let query_lower = name.trim().to_lowercase();

        let exact: Option<(f64, Option<String>)> =
            sqlx::query_as("SELECT quantity, unit FROM inventory WHERE item_name = ?")
                .bind(&query_lower)
                .fetch_optional(&self.pool)
                .await?;

        if let Some((quantity, unit)) = exact {
            return Ok(StockAnswer::Exact {
                name: query_lower,
                quantity,
                unit,
            });
        }

        let in_stock: Vec<StockLine> = sqlx::query_as(
            "SELECT item_name, quantity, unit FROM inventory WHERE quantity > 0 ORDER BY item_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        for line in in_stock {
            if line.item_name.contains(&query_lower) || query_lower.contains(&line.item_name) {
                return Ok(StockAnswer::Suggestion {
                    query: query_lower,
                    name: line.item_name,
                    quantity: line.quantity,
                    unit: line.unit,
                });
            }
        }

        Ok(StockAnswer::NotFound { query: query_lower })
    }

    /// All in-stock lines, ascending by name.
    ///
    /// An empty result means the stock is empty; storage failures surface as
    /// `Err` instead, so the two are never conflated.
    pub async fn query_all(&self) -> Result<Vec<StockLine>> {
        let lines = sqlx::query_as::<_, StockLine>(
            "SELECT item_name, quantity, unit FROM inventory WHERE quantity > 0 ORDER BY item_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Zero and prune the whole inventory.
    ///
    /// Writes one negative transaction_log row per in-stock item, zeroes
    /// every quantity, then deletes all now-zero rows (pruning any lingering
    /// zero-quantity rows left behind by USE clamps as well), all in one
    /// transaction. Clearing an already-empty store is a no-op reported as
    /// `Ok(0)`. Returns the number of cleared items.
    pub async fn clear_all(&self, actor: &str) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let to_clear: Vec<(String, f64)> =
            sqlx::query_as("SELECT item_name, quantity FROM inventory WHERE quantity > 0")
                .fetch_all(&mut *tx)
                .await?;

        if to_clear.is_empty() {
            info!("No items to clear for {}", actor);
            return Ok(0);
        }

        let now = Utc::now();
        for (item_name, quantity) in &to_clear {
            log_change(&mut tx, item_name, -*quantity, actor, now).await?;
        }

        sqlx::query("UPDATE inventory SET quantity = 0, last_updated = ?, last_updated_by = ?")
            .bind(now)
            .bind(actor)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM inventory WHERE quantity = 0")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Cleared {} items from inventory by {}", to_clear.len(), actor);
        Ok(to_clear.len())
    }

    /// Newest-first slice of the audit trail
    pub async fn recent_transactions(&self, limit: i64) -> Result<Vec<TransactionLogEntry>> {
        let entries = sqlx::query_as::<_, TransactionLogEntry>(
            "SELECT id, item_name, quantity_change, user_name, transaction_time
             FROM transaction_log ORDER BY transaction_time DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

/// Append one audit row inside the caller's transaction
async fn log_change(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    item_name: &str,
    quantity_change: f64,
    user_name: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO transaction_log (item_name, quantity_change, user_name, transaction_time)
         VALUES (?, ?, ?, ?)",
    )
    .bind(item_name)
    .bind(quantity_change)
    .bind(user_name)
    .bind(at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DescriptorStripper;
    use larder_common::db::{create_inventory_table, create_transaction_log_table};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> InventoryStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_inventory_table(&pool).await.unwrap();
        create_transaction_log_table(&pool).await.unwrap();
        InventoryStore::new(pool)
    }

    async fn log_changes(store: &InventoryStore, item: &str) -> Vec<f64> {
        sqlx::query_as::<_, (f64,)>(
            "SELECT quantity_change FROM transaction_log WHERE item_name = ? ORDER BY id ASC",
        )
        .bind(item)
        .fetch_all(store.pool())
        .await
        .unwrap()
        .into_iter()
        .map(|(change,)| change)
        .collect()
    }

    #[tokio::test]
    async fn add_inserts_then_accumulates() {
        let store = setup_store().await;

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("telur", 10.0, "butir")], "Andi")
            .await
            .unwrap();
        store
            .apply_changes(StockAction::Add, &[ItemChange::new("Telur", 5.0, "butir")], "Budi")
            .await
            .unwrap();

        match store.query_item("telur").await.unwrap() {
            StockAnswer::Exact { quantity, unit, .. } => {
                assert_eq!(quantity, 15.0);
                assert_eq!(unit.as_deref(), Some("butir"));
            }
            other => panic!("expected exact answer, got {:?}", other),
        }
        assert_eq!(log_changes(&store, "telur").await, vec![10.0, 5.0]);
    }

    #[tokio::test]
    async fn use_clamps_at_zero_but_logs_requested_amount() {
        let store = setup_store().await;

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("beras", 3.0, "kg")], "Andi")
            .await
            .unwrap();
        store
            .apply_changes(StockAction::Use, &[ItemChange::new("beras", 5.0, "kg")], "Budi")
            .await
            .unwrap();

        match store.query_item("beras").await.unwrap() {
            StockAnswer::Exact { quantity, .. } => assert_eq!(quantity, 0.0),
            other => panic!("expected exact answer, got {:?}", other),
        }
        assert_eq!(log_changes(&store, "beras").await, vec![3.0, -5.0]);
    }

    #[tokio::test]
    async fn use_on_absent_item_is_skipped_without_log_entry() {
        let store = setup_store().await;

        let outcome = store
            .apply_changes(StockAction::Use, &[ItemChange::new("keju", 1.0, "pcs")], "Citra")
            .await
            .unwrap();

        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.skipped, vec!["keju".to_string()]);
        assert!(store.query_all().await.unwrap().is_empty());
        assert!(log_changes(&store, "keju").await.is_empty());
    }

    #[tokio::test]
    async fn mixed_use_batch_applies_known_and_skips_unknown() {
        let store = setup_store().await;

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("gula", 2.0, "kg")], "Andi")
            .await
            .unwrap();
        let outcome = store
            .apply_changes(
                StockAction::Use,
                &[
                    ItemChange::new("gula", 1.0, "kg"),
                    ItemChange::new("vanili", 1.0, "pcs"),
                ],
                "Budi",
            )
            .await
            .unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped, vec!["vanili".to_string()]);
        assert_eq!(log_changes(&store, "gula").await, vec![2.0, -1.0]);
        assert!(log_changes(&store, "vanili").await.is_empty());
    }

    #[tokio::test]
    async fn query_all_filters_zero_rows_and_sorts_by_name() {
        let store = setup_store().await;

        store
            .apply_changes(
                StockAction::Add,
                &[
                    ItemChange::new("wortel", 4.0, "pcs"),
                    ItemChange::new("bayam", 2.0, "ikat"),
                ],
                "Andi",
            )
            .await
            .unwrap();
        // Drain one item to zero; it stays as a row but leaves the listing
        store
            .apply_changes(StockAction::Use, &[ItemChange::new("wortel", 4.0, "pcs")], "Andi")
            .await
            .unwrap();

        let lines = store.query_all().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item_name, "bayam");

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("apel", 3.0, "pcs")], "Andi")
            .await
            .unwrap();
        let names: Vec<String> = store
            .query_all()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.item_name)
            .collect();
        assert_eq!(names, vec!["apel", "bayam"]);
    }

    #[tokio::test]
    async fn query_all_on_empty_store_returns_empty_vec() {
        let store = setup_store().await;
        assert_eq!(store.query_all().await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn query_item_suggests_substring_relative() {
        let store = setup_store().await;

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("daging sapi", 1.0, "kg")], "Andi")
            .await
            .unwrap();

        match store.query_item("sapi").await.unwrap() {
            StockAnswer::Suggestion { query, name, quantity, .. } => {
                assert_eq!(query, "sapi");
                assert_eq!(name, "daging sapi");
                assert_eq!(quantity, 1.0);
            }
            other => panic!("expected suggestion, got {:?}", other),
        }

        match store.query_item("ayam").await.unwrap() {
            StockAnswer::NotFound { query } => assert_eq!(query, "ayam"),
            other => panic!("expected not-found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn clear_all_on_empty_store_is_a_successful_noop() {
        let store = setup_store().await;
        assert_eq!(store.clear_all("Andi").await.unwrap(), 0);

        let log_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transaction_log")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(log_rows, 0);
    }

    #[tokio::test]
    async fn clear_all_logs_and_prunes_each_row() {
        let store = setup_store().await;

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("beras", 5.0, "kg")], "Andi")
            .await
            .unwrap();

        assert_eq!(store.clear_all("Budi").await.unwrap(), 1);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);

        let (change, user): (f64, String) = sqlx::query_as(
            "SELECT quantity_change, user_name FROM transaction_log
             WHERE item_name = 'beras' ORDER BY id DESC LIMIT 1",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(change, -5.0);
        assert_eq!(user, "Budi");
    }

    #[tokio::test]
    async fn clear_all_prunes_zero_rows_without_extra_log_entries() {
        let store = setup_store().await;

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("telur", 2.0, "butir")], "Andi")
            .await
            .unwrap();
        store
            .apply_changes(StockAction::Use, &[ItemChange::new("telur", 2.0, "butir")], "Andi")
            .await
            .unwrap();
        store
            .apply_changes(StockAction::Add, &[ItemChange::new("beras", 1.0, "kg")], "Andi")
            .await
            .unwrap();

        assert_eq!(store.clear_all("Budi").await.unwrap(), 1);

        // The zero telur row is pruned, but only beras gets a clearing entry
        assert_eq!(log_changes(&store, "telur").await, vec![2.0, -2.0]);
        assert_eq!(log_changes(&store, "beras").await, vec![1.0, -1.0]);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn resolve_name_collapses_synonym_onto_stored_spelling() {
        let store = setup_store().await;

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("ayam", 1.0, "kg")], "Andi")
            .await
            .unwrap();

        let resolved = store
            .resolve_name("Daging Ayam", Some(&DescriptorStripper))
            .await
            .unwrap();
        assert_eq!(resolved, "ayam");

        // Nothing matching in stock: the normalized candidate becomes canonical
        let resolved = store
            .resolve_name("Buah Apel", Some(&DescriptorStripper))
            .await
            .unwrap();
        assert_eq!(resolved, "apel");
    }

    #[tokio::test]
    async fn recent_transactions_returns_newest_first() {
        let store = setup_store().await;

        store
            .apply_changes(StockAction::Add, &[ItemChange::new("telur", 10.0, "butir")], "Andi")
            .await
            .unwrap();
        store
            .apply_changes(StockAction::Use, &[ItemChange::new("telur", 3.0, "butir")], "Budi")
            .await
            .unwrap();

        let entries = store.recent_transactions(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].quantity_change, -3.0);
        assert_eq!(entries[0].user_name, "Budi");
        assert_eq!(entries[1].quantity_change, 10.0);

        let limited = store.recent_transactions(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].quantity_change, -3.0);
    }
}
