//! larder-stock - Grocery inventory CLI
//!
//! Thin command-line front end over the inventory store: add and consume
//! stock, query levels, list everything, clear, and inspect the audit trail.
//! Names are resolved through the rule-based descriptor stripper before any
//! mutation so synonymous entries land on one inventory row.

use anyhow::Result;
use clap::{Parser, Subcommand};
use larder_common::config;
use larder_stock::resolver::DescriptorStripper;
use larder_stock::store::{InventoryStore, StockAnswer};
use larder_stock::types::{ItemChange, StockAction};
use tracing::info;

#[derive(Parser)]
#[command(name = "larder-stock", about = "Grocery inventory tracker", version)]
struct Cli {
    /// Root folder holding the database (defaults to the platform data dir)
    #[arg(long, global = true)]
    root: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record newly bought stock
    Add {
        /// Items as NAME:QTY[:UNIT], e.g. "telur:10:butir"
        #[arg(required = true)]
        items: Vec<String>,
        /// Who is recording the change
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Record consumed stock
    Use {
        /// Items as NAME:QTY[:UNIT], e.g. "telur:3:butir"
        #[arg(required = true)]
        items: Vec<String>,
        /// Who is recording the change
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Show the stock for one item, or everything
    Stock {
        /// Item name; omit to list the whole inventory
        name: Option<String>,
    },
    /// Zero and remove every item
    Clear {
        /// Who is clearing the inventory
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Show the latest audit trail entries
    History {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let root = config::resolve_root_folder(cli.root.as_deref(), "LARDER_ROOT");
    let db_path = config::ensure_root_folder(&root)?;
    info!("Database: {}", db_path.display());

    let pool = larder_common::db::init_database(&db_path).await?;
    let store = InventoryStore::new(pool);

    match cli.command {
        Command::Add { items, by } => apply(&store, StockAction::Add, &items, &by).await?,
        Command::Use { items, by } => apply(&store, StockAction::Use, &items, &by).await?,
        Command::Stock { name: Some(name) } => match store.query_item(&name).await? {
            StockAnswer::Exact { name, quantity, unit } => {
                println!("{}: {} {}", name, quantity, unit.unwrap_or_default());
            }
            StockAnswer::Suggestion { query, name, quantity, unit } => {
                println!(
                    "No '{}' in stock. Did you mean '{}' ({} {})?",
                    query,
                    name,
                    quantity,
                    unit.unwrap_or_default()
                );
            }
            StockAnswer::NotFound { query } => {
                println!("No '{}' in stock.", query);
            }
        },
        Command::Stock { name: None } => {
            let lines = store.query_all().await?;
            if lines.is_empty() {
                println!("Stock is empty.");
            } else {
                for line in lines {
                    println!(
                        "{}: {} {}",
                        line.item_name,
                        line.quantity,
                        line.unit.unwrap_or_default()
                    );
                }
            }
        }
        Command::Clear { by } => {
            let cleared = store.clear_all(&by).await?;
            println!("Cleared {} items.", cleared);
        }
        Command::History { limit } => {
            for entry in store.recent_transactions(limit).await? {
                println!(
                    "{} {:+} '{}' by {}",
                    entry.transaction_time.format("%Y-%m-%d %H:%M:%S"),
                    entry.quantity_change,
                    entry.item_name,
                    entry.user_name
                );
            }
        }
    }

    Ok(())
}

async fn apply(
    store: &InventoryStore,
    action: StockAction,
    specs: &[String],
    actor: &str,
) -> Result<()> {
    let normalizer = DescriptorStripper;
    let mut items = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut item = parse_item(spec)?;
        item.name = store.resolve_name(&item.name, Some(&normalizer)).await?;
        items.push(item);
    }

    let outcome = store.apply_changes(action, &items, actor).await?;
    println!("Applied {} changes.", outcome.applied);
    for name in outcome.skipped {
        println!("Skipped '{}': not in stock.", name);
    }
    Ok(())
}

/// Parse a NAME:QTY[:UNIT] item argument.
///
/// Unlike the lenient wire boundary, direct CLI input rejects malformed
/// quantities outright so typos don't silently record zero.
fn parse_item(spec: &str) -> Result<ItemChange> {
    let mut parts = spec.splitn(3, ':');

    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        anyhow::bail!("item '{}' has no name; expected NAME:QTY[:UNIT]", spec);
    }

    let quantity: f64 = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("item '{}' has no quantity; expected NAME:QTY[:UNIT]", spec))?
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("item '{}' has an unparseable quantity", spec))?;
    if !quantity.is_finite() || quantity < 0.0 {
        anyhow::bail!("item '{}' has a negative or non-finite quantity", spec);
    }

    let unit = parts.next().unwrap_or("").trim().to_string();

    Ok(ItemChange {
        name: name.to_string(),
        quantity,
        unit,
    })
}
