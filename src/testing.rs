//! Scripted gateway and clock for exercising the loop without a broker

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::core::{Clock, Error, Gateway, OrderId, Result, Side, Symbol};

#[derive(Default)]
struct MockState {
    balance: Decimal,
    balance_fails: bool,
    prices: HashMap<Symbol, Decimal>,
    failing_quotes: HashSet<Symbol>,
    rejected: HashSet<(Symbol, Side)>,
    orders: Vec<(Symbol, u64, Side)>,
    quote_calls: usize,
}

pub struct MockGateway {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockGateway {
    pub fn new(balance: Decimal) -> Self {
        Self {
            state: Mutex::new(MockState {
                balance,
                ..MockState::default()
            }),
            latency: None,
        }
    }

    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.set_price(symbol, price);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.state.lock().prices.insert(Symbol::new(symbol), price);
    }

    pub fn set_balance(&self, balance: Decimal) {
        self.state.lock().balance = balance;
    }

    pub fn fail_balance(&self, fail: bool) {
        self.state.lock().balance_fails = fail;
    }

    pub fn fail_quote(&self, symbol: &str, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.failing_quotes.insert(Symbol::new(symbol));
        } else {
            state.failing_quotes.remove(&Symbol::new(symbol));
        }
    }

    pub fn reject_orders(&self, symbol: &str, side: Side, reject: bool) {
        let mut state = self.state.lock();
        let key = (Symbol::new(symbol), side);
        if reject {
            state.rejected.insert(key);
        } else {
            state.rejected.remove(&key);
        }
    }

    /// Orders that reached the broker, in submission order.
    pub fn orders(&self) -> Vec<(Symbol, u64, Side)> {
        self.state.lock().orders.clone()
    }

    pub fn quote_calls(&self) -> usize {
        self.state.lock().quote_calls
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn available_balance(&self) -> Result<Decimal> {
        self.delay().await;
        let state = self.state.lock();
        if state.balance_fails {
            return Err(Error::Gateway("margins unavailable".into()));
        }
        Ok(state.balance)
    }

    async fn last_price(&self, symbol: &Symbol) -> Result<Decimal> {
        self.delay().await;
        let mut state = self.state.lock();
        state.quote_calls += 1;
        if state.failing_quotes.contains(symbol) {
            return Err(Error::Gateway(format!("quote feed down for {}", symbol)));
        }
        state
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::Gateway(format!("unknown instrument {}", symbol)))
    }

    async fn place_order(&self, symbol: &Symbol, quantity: u64, side: Side) -> Result<OrderId> {
        self.delay().await;
        let mut state = self.state.lock();
        if state.rejected.contains(&(symbol.clone(), side)) {
            return Err(Error::Order(format!("{} {} rejected", side, symbol)));
        }
        state.orders.push((symbol.clone(), quantity, side));
        Ok(OrderId::new(format!("mock-{}", state.orders.len())))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Settable clock pinned to one trading day in IST.
pub struct FixedClock {
    now: Mutex<DateTime<Tz>>,
}

impl FixedClock {
    pub const DAY: (i32, u32, u32) = (2024, 3, 4);

    pub fn at(h: u32, m: u32) -> Self {
        Self {
            now: Mutex::new(ist(h, m, 0)),
        }
    }

    pub fn set(&self, h: u32, m: u32, s: u32) {
        *self.now.lock() = ist(h, m, s);
    }

    pub fn date() -> NaiveDate {
        let (y, mo, d) = Self::DAY;
        NaiveDate::from_ymd_opt(y, mo, d).unwrap()
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        *self.now.lock()
    }
}

fn ist(h: u32, m: u32, s: u32) -> DateTime<Tz> {
    let naive = FixedClock::date().and_hms_opt(h, m, s).unwrap();
    chrono_tz::Asia::Kolkata
        .from_local_datetime(&naive)
        .single()
        .unwrap()
}
