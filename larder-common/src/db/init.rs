//! Database initialization
//!
//! Opens (or creates) the SQLite database and brings the schema up to date.
//! All DDL is idempotent, so calling this on every startup is safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use sqlite options to create database if it doesn't exist
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Wait on the database lock instead of failing immediately
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_inventory_table(&pool).await?;
    create_transaction_log_table(&pool).await?;

    Ok(pool)
}

/// Create the inventory table
///
/// Current stock levels, one row per canonical item name. The UNIQUE
/// constraint on `item_name` enforces at-most-one-row-per-name; the CHECK
/// constraint backstops the mutator's quantity clamping.
pub async fn create_inventory_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_name TEXT NOT NULL UNIQUE,
            quantity REAL NOT NULL DEFAULT 0,
            unit TEXT,
            last_updated TIMESTAMP NOT NULL,
            last_updated_by TEXT NOT NULL,
            CHECK (quantity >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_inventory_item_name ON inventory(item_name)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the transaction_log table
///
/// Append-only audit trail. Every inventory mutation writes exactly one row
/// here inside the same transaction; rows are never updated or deleted.
pub async fn create_transaction_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transaction_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_name TEXT NOT NULL,
            quantity_change REAL NOT NULL,
            user_name TEXT NOT NULL,
            transaction_time TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transaction_log_item ON transaction_log(item_name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transaction_log_time ON transaction_log(transaction_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn init_creates_schema_on_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("data").join("larder.db");

        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"inventory"));
        assert!(names.contains(&"transaction_log"));
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("larder.db");

        let pool = init_database(&db_path).await.unwrap();
        sqlx::query(
            "INSERT INTO inventory (item_name, quantity, unit, last_updated, last_updated_by)
             VALUES ('beras', 5.0, 'kg', ?, 'tester')",
        )
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        // Re-open: schema creation must not clobber existing data
        let pool = init_database(&db_path).await.unwrap();
        let quantity: f64 =
            sqlx::query_scalar("SELECT quantity FROM inventory WHERE item_name = 'beras'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(quantity, 5.0);
    }

    #[tokio::test]
    async fn negative_quantity_rejected_by_check_constraint() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("larder.db")).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO inventory (item_name, quantity, unit, last_updated, last_updated_by)
             VALUES ('telur', -1.0, 'butir', ?, 'tester')",
        )
        .bind(Utc::now())
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn duplicate_item_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("larder.db")).await.unwrap();

        let insert = "INSERT INTO inventory (item_name, quantity, unit, last_updated, last_updated_by)
                      VALUES ('gula', 1.0, 'kg', ?, 'tester')";
        sqlx::query(insert).bind(Utc::now()).execute(&pool).await.unwrap();
        let result = sqlx::query(insert).bind(Utc::now()).execute(&pool).await;
        assert!(result.is_err());
    }
}
