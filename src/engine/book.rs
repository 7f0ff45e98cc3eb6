//! Position Book - the engine's in-memory record of open positions

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::core::{Error, Position, Result, Side, Symbol, TradeRecord};
use crate::engine::rules::ExitRules;

/// Open positions keyed by symbol, at most one per symbol.
///
/// Ordered by symbol so exit scans are deterministic.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: BTreeMap<Symbol, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly filled entry. Re-entry while open is an invariant violation.
    pub fn upsert_on_entry(&mut self, symbol: Symbol, position: Position) -> Result<()> {
        if let Some(existing) = self.positions.get(&symbol) {
            return Err(Error::InvariantViolation(format!(
                "{} already open (qty={} @ {})",
                symbol, existing.quantity, existing.entry_price
            )));
        }
        self.positions.insert(symbol, position);
        Ok(())
    }

    /// Drop a position after its exit fill.
    pub fn remove_on_exit(&mut self, symbol: &Symbol) -> Result<Position> {
        self.positions
            .remove(symbol)
            .ok_or_else(|| Error::InvariantViolation(format!("{} has no open position", symbol)))
    }

    /// Owned copy for iteration while the book is mutated.
    pub fn snapshot(&self) -> Vec<(Symbol, Position)> {
        self.positions
            .iter()
            .map(|(s, p)| (s.clone(), p.clone()))
            .collect()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Capital tied up at entry prices.
    pub fn committed_capital(&self) -> Decimal {
        self.positions.values().map(Position::cost).sum()
    }

    /// Rebuild the book from the journal's fills for `session_date`.
    ///
    /// Intraday positions do not survive the session, so earlier days are
    /// ignored. Only fills from the same mode count: a live run never
    /// inherits positions that were only simulated, and vice versa. Fills that contradict the book (a second BUY while open, a
    /// SELL with nothing open or for a different quantity) are logged and
    /// skipped rather than guessed at.
    pub fn replay(
        records: &[TradeRecord],
        session_date: NaiveDate,
        rules: &ExitRules,
        dry_run: bool,
    ) -> Self {
        let mut book = Self::new();

        let today = records.iter().filter(|r| r.timestamp.date() == session_date);
        let (matching, other_mode): (Vec<_>, Vec<_>) = today.partition(|r| r.dry_run == dry_run);
        if !other_mode.is_empty() {
            info!(
                skipped = other_mode.len(),
                dry_run,
                "Ignoring today's fills recorded in the other trading mode"
            );
        }

        for rec in matching {
            match rec.action {
                Side::Buy => {
                    let position = Position::open(
                        rec.symbol.clone(),
                        rec.quantity,
                        rec.price,
                        rules.profit_target(),
                        rules.stop_loss(),
                        rec.timestamp,
                    );
                    if let Err(e) = book.upsert_on_entry(rec.symbol.clone(), position) {
                        warn!(symbol = %rec.symbol, at = %rec.timestamp, "Replay skipped BUY: {}", e);
                    }
                }
                Side::Sell => match book.get(&rec.symbol).map(|p| p.quantity) {
                    Some(held) if held == rec.quantity => {
                        book.positions.remove(&rec.symbol);
                    }
                    Some(held) => {
                        warn!(
                            symbol = %rec.symbol,
                            held,
                            sold = rec.quantity,
                            "Replay skipped SELL: quantity does not match open position"
                        );
                    }
                    None => {
                        warn!(symbol = %rec.symbol, at = %rec.timestamp, "Replay skipped SELL: no open position");
                    }
                },
            }
        }

        if !book.is_empty() {
            info!(
                open = book.len(),
                committed = %book.committed_capital(),
                "Reconstructed open positions from journal"
            );
        }
        book
    }
}
