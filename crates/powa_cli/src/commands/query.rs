//! Query command implementation.

use super::{to_json, Snapshot};
use powa_codec::Value;
use powa_core::engine::IndexKey;
use std::path::Path;

/// Reads a command-line key: integers stay integers, anything else is text.
fn parse_key(raw: &str) -> Value {
    raw.parse::<i64>()
        .map_or_else(|_| Value::from(raw), Value::from)
}

/// Primary keys and documents matching `raw_key` on `index`, in key order.
pub fn lookup(
    path: &Path,
    store: &str,
    index: &str,
    raw_key: &str,
) -> Result<Vec<(String, serde_json::Value)>, Box<dyn std::error::Error>> {
    let snapshot = Snapshot::load(path)?;
    let state = snapshot.store(store)?;
    let index_state = state
        .index(index)
        .ok_or_else(|| format!("store {store:?} has no index named {index:?}"))?;

    let Some(key) = IndexKey::from_value(&parse_key(raw_key)) else {
        return Ok(Vec::new());
    };
    Ok(index_state
        .lookup(&key)
        .filter_map(|primary| {
            state
                .get(primary)
                .map(|value| (primary.to_string(), to_json(value)))
        })
        .collect())
}

/// Runs the query command.
pub fn run(
    path: &Path,
    store: &str,
    index: &str,
    raw_key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let matches = lookup(path, store, index, raw_key)?;
    if matches.is_empty() {
        println!("no records match");
    }
    for (key, data) in matches {
        println!("{key}\t{data}");
    }
    Ok(())
}
