//! Exclusion Store - symbols an operator has disabled from trading
//!
//! Shared with the operator tooling through one JSON file. The engine only
//! reads it; every read is a fresh, possibly stale, snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::{Result, Symbol};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExclusionFile {
    #[serde(default)]
    stocks: Vec<serde_json::Value>,
}

/// `{read, write}` capability over the persisted exclusion list.
#[derive(Debug, Clone)]
pub struct ExclusionStore {
    path: PathBuf,
}

impl ExclusionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current set. A missing file means nothing is excluded.
    pub fn load(&self) -> Result<BTreeSet<Symbol>> {
        if !self.path.exists() {
            return Ok(BTreeSet::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let file: ExclusionFile = serde_json::from_str(&content)?;
        Ok(normalize(&file.stocks))
    }

    /// Add `symbol`. Returns `false` if it was already excluded.
    pub fn exclude(&self, symbol: &Symbol) -> Result<bool> {
        let mut set = self.load()?;
        if !set.insert(symbol.clone()) {
            return Ok(false);
        }
        self.save(&set)?;
        info!(%symbol, "Excluded from trading");
        Ok(true)
    }

    /// Remove `symbol`. Returns `false` if it was not excluded.
    pub fn include(&self, symbol: &Symbol) -> Result<bool> {
        let mut set = self.load()?;
        if !set.remove(symbol) {
            return Ok(false);
        }
        self.save(&set)?;
        info!(%symbol, "Included for trading");
        Ok(true)
    }

    /// Replace the file contents via temp file + rename.
    pub fn save(&self, set: &BTreeSet<Symbol>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = ExclusionFile {
            stocks: set
                .iter()
                .map(|s| serde_json::Value::String(s.to_string()))
                .collect(),
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), count = set.len(), "Saved exclusion list");
        Ok(())
    }
}

/// Uppercase, trim, drop blanks and non-strings, dedupe.
pub(crate) fn normalize(raw: &[serde_json::Value]) -> BTreeSet<Symbol> {
    raw.iter()
        .filter_map(|v| v.as_str())
        .filter_map(Symbol::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_excludes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = ExclusionStore::new(dir.path().join("excluded.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_normalizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded.json");
        fs::write(&path, r#"{"stocks": [" infy", "TCS", "infy", "", 42, null]}"#).unwrap();

        let set = ExclusionStore::new(&path).load().unwrap();
        let names: Vec<_> = set.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["INFY", "TCS"]);
    }

    #[test]
    fn test_exclude_include_persist() {
        let dir = TempDir::new().unwrap();
        let store = ExclusionStore::new(dir.path().join("excluded.json"));
        let sbin = Symbol::new("sbin");

        assert!(store.exclude(&sbin).unwrap());
        assert!(!store.exclude(&sbin).unwrap());
        assert!(store.exclude(&Symbol::new("ITC")).unwrap());

        let raw = fs::read_to_string(store.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["stocks"], serde_json::json!(["ITC", "SBIN"]));

        assert!(store.include(&sbin).unwrap());
        assert!(!store.include(&sbin).unwrap());
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(ExclusionStore::new(&path).load().is_err());
    }
}
