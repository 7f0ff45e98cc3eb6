//! Core types - Strong typing for symbols, orders and fills

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix carried by every order id minted in dry-run mode.
pub const DRY_RUN_PREFIX: &str = "dry-run-";

/// Exchange trading symbol (e.g., "INFY"), always trimmed and uppercase
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(Symbol::new)
    }
}

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Normalize a raw ticker, rejecting blanks.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broker acknowledgement for a placed order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for an order that was never sent to the broker.
    pub fn synthetic(side: Side, symbol: &Symbol, unix_secs: i64) -> Self {
        Self(format!(
            "{}{}-{}-{}",
            DRY_RUN_PREFIX,
            side.as_str().to_lowercase(),
            symbol,
            unix_secs
        ))
    }

    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with(DRY_RUN_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open long position held intraday
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: u64,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub stop_price: Decimal,
    pub opened_at: NaiveDateTime,
}

impl Position {
    /// Derive target and stop levels from the entry fill.
    pub fn open(
        symbol: Symbol,
        quantity: u64,
        entry_price: Decimal,
        profit_target: Decimal,
        stop_loss: Decimal,
        opened_at: NaiveDateTime,
    ) -> Self {
        Self {
            symbol,
            quantity,
            entry_price,
            target_price: entry_price * (Decimal::ONE + profit_target),
            stop_price: entry_price * (Decimal::ONE - stop_loss),
            opened_at,
        }
    }

    /// Capital committed at entry.
    pub fn cost(&self) -> Decimal {
        self.entry_price * Decimal::from(self.quantity)
    }
}

/// One executed fill, as written to the trade journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(with = "journal_timestamp")]
    pub timestamp: NaiveDateTime,
    pub symbol: Symbol,
    pub action: Side,
    pub quantity: u64,
    pub price: Decimal,
    /// Synthesized fill from a dry run; absent on older lines
    #[serde(default)]
    pub dry_run: bool,
}

impl TradeRecord {
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// `YYYY-MM-DD HH:MM:SS` in the market timezone.
mod journal_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
