//! Core traits - the seams between the engine and the outside world

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::core::{OrderId, Result, Side, Symbol};

/// Broker boundary - quotes, balance and market orders
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Cash/margin available for new entries
    async fn available_balance(&self) -> Result<Decimal>;

    /// Latest traded price for one instrument
    async fn last_price(&self, symbol: &Symbol) -> Result<Decimal>;

    /// Submit a market order for immediate execution
    async fn place_order(&self, symbol: &Symbol, quantity: u64, side: Side) -> Result<OrderId>;

    /// Gateway name
    fn name(&self) -> &str;
}

/// Wall clock in the market timezone
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

/// System clock projected into a fixed exchange timezone
#[derive(Debug, Clone, Copy)]
pub struct MarketClock {
    tz: Tz,
}

impl MarketClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for MarketClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}
