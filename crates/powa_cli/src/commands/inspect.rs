//! Inspect command implementation.

use super::Snapshot;
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database directory.
    pub path: String,
    /// Persisted schema version.
    pub version: u32,
    /// Id of the last committed transaction.
    pub last_txid: u64,
    /// Log file size in bytes.
    pub log_size: u64,
    /// Number of log records.
    pub log_records: usize,
    /// Bytes after the last complete frame.
    pub torn_bytes: u64,
    /// Per-store statistics.
    pub stores: Vec<StoreStats>,
}

/// Statistics for a single store.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    /// Store name.
    pub name: String,
    /// Number of records.
    pub records: usize,
    /// Declared indexes.
    pub indexes: Vec<IndexStats>,
}

/// One index of a store.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    /// Index name.
    pub name: String,
    /// Field path the index reads.
    pub key_path: String,
    /// Whether keys must be unique.
    pub unique: bool,
    /// Number of distinct keys.
    pub distinct_keys: usize,
}

/// Collects the inspection result for the database at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let snapshot = Snapshot::load(path)?;
    let engine = &snapshot.engine;

    let stores = engine
        .stores()
        .map(|store| StoreStats {
            name: store.name().to_string(),
            records: store.len(),
            indexes: store
                .indexes()
                .map(|index| IndexStats {
                    name: index.definition().name.clone(),
                    key_path: index.definition().key_path.clone(),
                    unique: index.definition().unique,
                    distinct_keys: index.len(),
                })
                .collect(),
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        version: engine.version(),
        last_txid: engine.last_txid().as_u64(),
        log_size: snapshot.log_size,
        log_records: snapshot.records,
        torn_bytes: snapshot.log_size - snapshot.valid_len,
        stores,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("POWA Database Inspection");
    println!("========================");
    println!();
    println!("Path:           {}", result.path);
    println!("Schema version: {}", result.version);
    println!("Last txn:       {}", result.last_txid);
    println!();
    println!("Log:");
    println!("  Size:    {}", format_size(result.log_size));
    println!("  Records: {}", result.log_records);
    if result.torn_bytes > 0 {
        println!("  Torn:    {} bytes at end", result.torn_bytes);
    }
    println!();
    println!("Stores:");
    for store in &result.stores {
        println!("  {} ({} records)", store.name, store.records);
        for index in &store.indexes {
            println!(
                "    index {} on {}{} ({} keys)",
                index.name,
                index.key_path,
                if index.unique { ", unique" } else { "" },
                index.distinct_keys
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
