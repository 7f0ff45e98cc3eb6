//! Prediction Feed - the day's candidate symbols

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::core::{Result, Symbol};
use crate::exclusions::normalize;

#[derive(Debug, Deserialize)]
struct PredictionFile {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    stocks: Vec<serde_json::Value>,
}

/// Read-only candidate list for one session, sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predictions {
    pub date: Option<NaiveDate>,
    pub symbols: Vec<Symbol>,
}

impl Predictions {
    /// Load the artifact at `path`.
    ///
    /// A missing file yields an empty list so the loop can still manage
    /// positions reconstructed from the journal. A malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Predictions file not found, no entries will be taken");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: PredictionFile = serde_json::from_str(content)?;

        let date = file.date.as_deref().and_then(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|e| warn!(date = raw, "Unparseable prediction date: {}", e))
                .ok()
        });

        Ok(Self {
            date,
            symbols: normalize(&file.stocks).into_iter().collect(),
        })
    }

    /// Whether the artifact was produced for `session_date`.
    pub fn is_for(&self, session_date: NaiveDate) -> bool {
        self.date == Some(session_date)
    }
}
