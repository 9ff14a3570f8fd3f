//! Dump command implementation.

use super::{to_json, Snapshot};
use std::path::Path;

/// Renders up to `limit` records of `store` as JSON lines, in key order.
pub fn render(
    path: &Path,
    store: &str,
    limit: Option<usize>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let snapshot = Snapshot::load(path)?;
    let store = snapshot.store(store)?;

    store
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(key, value)| {
            let line = serde_json::json!({ "key": key, "data": to_json(value) });
            Ok(serde_json::to_string(&line)?)
        })
        .collect()
}

/// Runs the dump command.
pub fn run(path: &Path, store: &str, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    for line in render(path, store, limit)? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::seed;
    use tempfile::tempdir;

    #[test]
    fn dumps_in_key_order() {
        let root = tempdir().unwrap();
        seed(root.path());
        let path = root.path().join("POWA");

        let lines = render(&path, "tags", None).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            r#"{"data":{"imageKey":"i1","value":"cat"},"key":"t1"}"#
        );

        assert_eq!(render(&path, "tags", Some(1)).unwrap().len(), 1);
        assert!(render(&path, "images", None).is_err());
    }
}
