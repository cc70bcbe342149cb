//! Action and item types crossing the orchestration boundary
//!
//! These mirror the wire shapes produced by the upstream intent classifier:
//! an action verb, a list of {name, quantity, unit} items, and the actor's
//! display name.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::warn;

/// Inventory action verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockAction {
    Add,
    Use,
}

impl fmt::Display for StockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockAction::Add => write!(f, "ADD"),
            StockAction::Use => write!(f, "USE"),
        }
    }
}

/// One requested stock change.
///
/// Quantities arrive from the upstream extractor as numbers or numeric
/// strings and are occasionally malformed. Deserialization coerces anything
/// unusable to 0.0 instead of rejecting the whole request, matching the
/// lenient policy of the rest of the pipeline; negative and non-finite
/// values coerce too, so a deserialized item always satisfies
/// `quantity >= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemChange {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
}

impl ItemChange {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
        }
    }
}

/// Caller-supplied action descriptor: one ADD/USE batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub action: StockAction,
    pub items: Vec<ItemChange>,
    pub actor: String,
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct QuantityVisitor;

    impl<'de> Visitor<'de> for QuantityVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or numeric string")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            Ok(v.trim().parse().unwrap_or_else(|_| {
                warn!("Unparseable quantity '{}', coercing to 0", v);
                0.0
            }))
        }

        fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }
    }

    let quantity = deserializer.deserialize_any(QuantityVisitor)?;
    if quantity.is_finite() && quantity >= 0.0 {
        Ok(quantity)
    } else {
        warn!("Out-of-range quantity {}, coercing to 0", quantity);
        Ok(0.0)
    }
}
