//! Protocol-version lookup table (supplemental feature grounded on
//! `server_info.py`'s `PROTOCOL_VERSIONS`): maps a version string like
//! `"1.20.1"` to its protocol number, loaded from the collaborator-visible
//! `protocol_versions.json` (spec §6) with graceful fallback to a built-in
//! table when the file is absent, unparsable, or partially invalid.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

/// A trimmed version of the original's embedded table (1.7.2 through
/// 1.21.1) used when `protocol_versions.json` is unavailable.
fn builtin_table() -> HashMap<String, i64> {
    [
        ("1.21.1", 767),
        ("1.21", 766),
        ("1.20.6", 766),
        ("1.20.4", 765),
        ("1.20.2", 764),
        ("1.20.1", 763),
        ("1.20", 763),
        ("1.19.4", 762),
        ("1.19.2", 760),
        ("1.19", 759),
        ("1.18.2", 758),
        ("1.18", 757),
        ("1.17.1", 756),
        ("1.17", 755),
        ("1.16.5", 754),
        ("1.16.1", 736),
        ("1.15.2", 578),
        ("1.14.4", 498),
        ("1.13.2", 404),
        ("1.12.2", 340),
        ("1.11.2", 316),
        ("1.10.2", 210),
        ("1.9.4", 110),
        ("1.8.9", 47),
        ("1.7.10", 5),
        ("1.7.2", 4),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Loads the protocol-version table from `path`, tolerating the nested
/// `{"Java Edition": {...}}` shape the original also accepts, and skipping
/// (not erroring on) entries that can't be coerced to an integer.
pub fn load_versions(path: impl AsRef<Path>) -> HashMap<String, i64> {
    let path = path.as_ref();
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            debug!("no protocol_versions.json at {path:?}, using built-in table");
            return builtin_table();
        }
    };

    let parsed: Value = match serde_json::from_str(&contents) {
        Ok(v) => v,
        Err(e) => {
            warn!("failed to parse {path:?}: {e}, using built-in table");
            return builtin_table();
        }
    };

    let versions_obj = parsed
        .get("Java Edition")
        .cloned()
        .unwrap_or(parsed);

    let Some(map) = versions_obj.as_object() else {
        warn!("protocol_versions.json was not an object, using built-in table");
        return builtin_table();
    };

    let mut table = HashMap::new();
    for (name, value) in map {
        if let Some(n) = value.as_i64() {
            table.insert(name.clone(), n);
        }
    }

    if table.is_empty() {
        builtin_table()
    } else {
        table
    }
}

pub fn version_for<'a>(table: &'a HashMap<String, i64>, name: &str) -> Option<i64> {
    table.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let table = load_versions("/nonexistent/protocol_versions.json");
        assert_eq!(version_for(&table, "1.20.1"), Some(763));
    }

    #[test]
    fn nested_java_edition_key_is_unwrapped() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            serde_json::json!({"Java Edition": {"1.21": 766, "bogus": "nope"}}).to_string(),
        )
        .unwrap();

        let table = load_versions(tmp.path());
        assert_eq!(version_for(&table, "1.21"), Some(766));
        assert_eq!(version_for(&table, "bogus"), None);
    }
}
