//! Trade Journal - append-only JSON Lines record of every fill

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::{Result, Side, Symbol, TradeRecord};

/// Append-only writer/reader over one `.jsonl` file.
#[derive(Debug, Clone)]
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    ///
    /// The line is written with one `write_all` on an `O_APPEND` handle, so
    /// concurrent readers never see a half record from this writer.
    pub fn append(&self, record: &TradeRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        debug!(
            symbol = %record.symbol,
            action = %record.action,
            qty = record.quantity,
            price = %record.price,
            "Journaled fill"
        );
        Ok(())
    }

    /// All records in write order. A missing journal is an empty one.
    ///
    /// Lines that fail to parse are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<TradeRecord>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }

        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut records = vec![];
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TradeRecord>(&line) {
                Ok(rec) => records.push(rec),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    "Skipping malformed journal line: {}",
                    e
                ),
            }
        }
        Ok(records)
    }
}

/// Realized activity reconstructed from journal records.
///
/// Live fills and dry-run fills are tallied apart; only live fills feed the
/// trade counts and P/L.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalSummary {
    pub trades: usize,
    pub buys: usize,
    pub sells: usize,
    /// SELL notional minus BUY notional
    pub net_pnl: Decimal,
    pub by_symbol: BTreeMap<Symbol, Decimal>,
    pub simulated: usize,
    pub simulated_pnl: Decimal,
}

impl JournalSummary {
    pub fn from_records(records: &[TradeRecord]) -> Self {
        let mut summary = Self::default();

        for rec in records {
            if rec.dry_run {
                summary.simulated += 1;
                summary.simulated_pnl += match rec.action {
                    Side::Buy => -rec.notional(),
                    Side::Sell => rec.notional(),
                };
                continue;
            }

            summary.trades += 1;
            let signed = match rec.action {
                Side::Buy => {
                    summary.buys += 1;
                    -rec.notional()
                }
                Side::Sell => {
                    summary.sells += 1;
                    rec.notional()
                }
            };
            summary.net_pnl += signed;
            *summary
                .by_symbol
                .entry(rec.symbol.clone())
                .or_insert(Decimal::ZERO) += signed;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn fill(sym: &str, action: Side, qty: u64, price: Decimal, minute: u32) -> TradeRecord {
        TradeRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(10, minute, 0)
                .unwrap(),
            symbol: Symbol::new(sym),
            action,
            quantity: qty,
            price,
            dry_run: false,
        }
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let dir = TempDir::new().unwrap();
        let journal = TradeJournal::new(dir.path().join("trades.jsonl"));
        assert!(journal.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_appends_preserve_write_order() {
        let dir = TempDir::new().unwrap();
        let journal = TradeJournal::new(dir.path().join("logs").join("trades.jsonl"));

        let fills = vec![
            fill("INFY", Side::Buy, 2, dec!(400), 1),
            fill("TCS", Side::Buy, 1, dec!(3000), 2),
            fill("INFY", Side::Sell, 2, dec!(408), 3),
            fill("SBIN", Side::Buy, 5, dec!(600), 4),
            fill("TCS", Side::Sell, 1, dec!(2970), 5),
        ];
        for f in &fills {
            journal.append(f).unwrap();
        }

        let read = journal.read_all().unwrap();
        assert_eq!(read, fills);

        // appending never touches earlier lines
        let before = fs::read_to_string(journal.path()).unwrap();
        journal.append(&fill("SBIN", Side::Sell, 5, dec!(606), 6)).unwrap();
        let after = fs::read_to_string(journal.path()).unwrap();
        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), 6);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.jsonl");
        fs::write(
            &path,
            "{\"timestamp\":\"2024-03-04 10:00:00\",\"symbol\":\"INFY\",\"action\":\"BUY\",\"quantity\":2,\"price\":400.0}\n\
             not json\n\n",
        )
        .unwrap();

        let records = TradeJournal::new(&path).read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, dec!(400));
    }

    #[test]
    fn test_summary_pnl() {
        let records = vec![
            fill("INFY", Side::Buy, 2, dec!(400), 1),
            fill("INFY", Side::Sell, 2, dec!(408), 2),
            fill("TCS", Side::Buy, 1, dec!(3000), 3),
            fill("TCS", Side::Sell, 1, dec!(2970), 4),
        ];
        let summary = JournalSummary::from_records(&records);

        assert_eq!(summary.trades, 4);
        assert_eq!(summary.buys, 2);
        assert_eq!(summary.sells, 2);
        assert_eq!(summary.net_pnl, dec!(-14));
        assert_eq!(summary.by_symbol[&Symbol::new("INFY")], dec!(16));
        assert_eq!(summary.by_symbol[&Symbol::new("TCS")], dec!(-30));
    }

    #[test]
    fn test_summary_sets_dry_run_fills_aside() {
        let records = vec![
            fill("INFY", Side::Buy, 2, dec!(400), 1),
            fill("INFY", Side::Sell, 2, dec!(408), 2),
            TradeRecord {
                dry_run: true,
                ..fill("TCS", Side::Buy, 1, dec!(3000), 3)
            },
            TradeRecord {
                dry_run: true,
                ..fill("TCS", Side::Sell, 1, dec!(3090), 4)
            },
        ];
        let summary = JournalSummary::from_records(&records);

        assert_eq!(summary.trades, 2);
        assert_eq!(summary.net_pnl, dec!(16));
        assert!(!summary.by_symbol.contains_key(&Symbol::new("TCS")));
        assert_eq!(summary.simulated, 2);
        assert_eq!(summary.simulated_pnl, dec!(90));
    }
}
