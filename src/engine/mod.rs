//! Trading Loop Engine
//!
//! One cycle = an entry pass over the day's candidates followed by an exit
//! pass over the open positions. Cycles run strictly one after another on a
//! fixed interval while the session window is open; outside it the loop
//! only sleeps.
//!
//! Per symbol the lifecycle is `NO_POSITION -> OPEN -> NO_POSITION`. A
//! position enters the book only after its BUY was acknowledged and
//! journaled, and leaves it only after its SELL was acknowledged and
//! journaled.

pub mod book;
pub mod rules;
pub mod session;

use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::core::{Clock, Error, Position, Result, Side, Symbol, TradeRecord};
use crate::exclusions::ExclusionStore;
use crate::execution::OrderRouter;
use crate::journal::TradeJournal;

pub use book::PositionBook;
pub use rules::{ExitReason, ExitRules, size_entry};
pub use session::TradingSession;

/// Loop timing and decision parameters.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub session: TradingSession,
    pub rules: ExitRules,
    pub poll_interval: Duration,
    pub idle_interval: Duration,
    pub max_cycles: Option<u64>,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub opened: Vec<Symbol>,
    pub closed: Vec<(Symbol, ExitReason)>,
    /// Wallet left after the entry pass
    pub wallet_left: Decimal,
}

/// What a whole run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Loop iterations, inside or outside the window
    pub cycles: u64,
    /// Iterations that evaluated entries and exits
    pub trading_cycles: u64,
    pub entries: usize,
    pub exits: usize,
    /// Positions still open when the loop stopped
    pub open_positions: usize,
}

pub struct Engine {
    router: OrderRouter,
    clock: Arc<dyn Clock>,
    journal: TradeJournal,
    exclusions: ExclusionStore,
    excluded: BTreeSet<Symbol>,
    candidates: Vec<Symbol>,
    book: PositionBook,
    settings: EngineSettings,
    stop: Option<watch::Receiver<bool>>,
}

impl Engine {
    pub fn new(
        router: OrderRouter,
        clock: Arc<dyn Clock>,
        journal: TradeJournal,
        exclusions: ExclusionStore,
        candidates: Vec<Symbol>,
        settings: EngineSettings,
    ) -> Self {
        let mut candidates = candidates;
        candidates.sort();
        candidates.dedup();

        Self {
            router,
            clock,
            journal,
            exclusions,
            excluded: BTreeSet::new(),
            candidates,
            book: PositionBook::new(),
            settings,
            stop: None,
        }
    }

    /// Start from positions reconstructed before the first cycle.
    pub fn with_book(mut self, book: PositionBook) -> Self {
        self.book = book;
        self
    }

    /// Stop cooperatively once `true` is sent.
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn candidates(&self) -> &[Symbol] {
        &self.candidates
    }

    /// Run cycles until the stop signal, the cycle limit, or a fatal error.
    ///
    /// Open positions are left as they are on exit.
    pub async fn run(&mut self) -> Result<RunReport> {
        info!(
            candidates = self.candidates.len(),
            open = self.book.len(),
            poll = ?self.settings.poll_interval,
            dry_run = self.router.is_dry_run(),
            gateway = self.router.gateway_name(),
            "🚀 Starting trading loop"
        );

        let mut report = RunReport::default();
        loop {
            if self.stop_requested() {
                info!("Stop requested, leaving trading loop");
                break;
            }

            report.cycles += 1;
            let now = self.clock.now();
            let pause = if self.settings.session.is_open(now.time()) {
                report.trading_cycles += 1;
                let cycle = self.run_cycle().await?;
                report.entries += cycle.opened.len();
                report.exits += cycle.closed.len();
                self.settings.poll_interval
            } else {
                debug!(time = %now.time(), "Outside trading window");
                self.settings.idle_interval
            };

            if let Some(max) = self.settings.max_cycles {
                if report.cycles >= max {
                    info!(max, "Max cycles reached, exiting trading loop");
                    break;
                }
            }

            self.pause(pause).await;
        }

        report.open_positions = self.book.len();
        Ok(report)
    }

    /// One entry pass followed by one exit pass.
    ///
    /// Per-symbol failures are logged and skipped; only errors that would
    /// leave an unrecorded fill behind are returned.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.refresh_exclusions();

        let mut wallet = match self.router.available_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                error!("Failed to fetch balance: {}", e);
                Decimal::ZERO
            }
        };
        debug!(wallet = %wallet, "💰 Cycle wallet");

        let mut report = CycleReport::default();

        let candidates = self.candidates.clone();
        for symbol in &candidates {
            match self.try_enter(symbol, wallet).await {
                Ok(Some(cost)) => {
                    wallet -= cost;
                    report.opened.push(symbol.clone());
                }
                Ok(None) => {}
                Err(e) if e.is_recoverable() => log_skip(symbol, "entry", &e),
                Err(e) => return Err(e),
            }
        }
        report.wallet_left = wallet;

        // Cutoff is judged at the start of the exit scan, so an entry made in
        // this same cycle can be flattened immediately.
        let exit_time = self.clock.now().time();
        let flatten = self.settings.session.must_flatten(exit_time);
        if flatten && !self.book.is_empty() {
            info!(time = %exit_time, open = self.book.len(), "Flatten cutoff reached");
        }

        for (symbol, position) in self.book.snapshot() {
            match self.try_exit(&symbol, &position, flatten).await {
                Ok(Some(reason)) => report.closed.push((symbol, reason)),
                Ok(None) => {}
                Err(e) if e.is_recoverable() => log_skip(&symbol, "exit", &e),
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Returns the capital consumed if a position was opened.
    async fn try_enter(&mut self, symbol: &Symbol, wallet: Decimal) -> Result<Option<Decimal>> {
        if self.excluded.contains(symbol) {
            debug!(%symbol, "Excluded, skipping entry");
            return Ok(None);
        }
        if self.book.contains(symbol) {
            return Ok(None);
        }

        let price = self.router.last_price(symbol).await?;
        let Some(quantity) = size_entry(wallet, price) else {
            debug!(%symbol, price = %price, wallet = %wallet, "Cannot size entry");
            return Ok(None);
        };

        let order_id = self.router.submit(symbol, quantity, Side::Buy).await?;
        info!(%symbol, qty = quantity, price = %price, order_id = %order_id, "🟢 BUY");

        let opened_at = self.clock.now().naive_local();
        let record = TradeRecord {
            timestamp: opened_at,
            symbol: symbol.clone(),
            action: Side::Buy,
            quantity,
            price,
            dry_run: order_id.is_synthetic(),
        };
        self.journal.append(&record).inspect_err(|e| {
            error!(%symbol, qty = quantity, price = %price, order_id = %order_id, "BUY filled but not journaled: {}", e)
        })?;

        let position = Position::open(
            symbol.clone(),
            quantity,
            price,
            self.settings.rules.profit_target(),
            self.settings.rules.stop_loss(),
            opened_at,
        );
        debug!(%symbol, target = %position.target_price, stop = %position.stop_price, "Position opened");
        let cost = position.cost();
        self.book.upsert_on_entry(symbol.clone(), position)?;

        Ok(Some(cost))
    }

    async fn try_exit(
        &mut self,
        symbol: &Symbol,
        position: &Position,
        flatten: bool,
    ) -> Result<Option<ExitReason>> {
        let price = self.router.last_price(symbol).await?;
        let Some(reason) = self.settings.rules.exit_reason(position, price, flatten) else {
            return Ok(None);
        };

        let quantity = position.quantity;
        let order_id = self.router.submit(symbol, quantity, Side::Sell).await?;
        info!(
            %symbol,
            qty = quantity,
            price = %price,
            entry = %position.entry_price,
            opened_at = %position.opened_at,
            %reason,
            order_id = %order_id,
            "🔴 SELL"
        );

        let record = TradeRecord {
            timestamp: self.clock.now().naive_local(),
            symbol: symbol.clone(),
            action: Side::Sell,
            quantity,
            price,
            dry_run: order_id.is_synthetic(),
        };
        self.journal.append(&record).inspect_err(|e| {
            error!(%symbol, qty = quantity, price = %price, order_id = %order_id, "SELL filled but not journaled: {}", e)
        })?;

        self.book.remove_on_exit(symbol)?;
        Ok(Some(reason))
    }

    /// Re-read the exclusion list, keeping the last good snapshot on failure.
    fn refresh_exclusions(&mut self) {
        match self.exclusions.load() {
            Ok(set) => {
                if set != self.excluded {
                    info!(count = set.len(), symbols = ?set, "Exclusion list updated");
                }
                self.excluded = set;
            }
            Err(e) => warn!(
                path = %self.exclusions.path().display(),
                "Failed to read exclusion list, keeping previous snapshot: {}",
                e
            ),
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn pause(&mut self, duration: Duration) {
        let Some(rx) = self.stop.as_mut() else {
            tokio::time::sleep(duration).await;
            return;
        };

        let sender_alive = tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            changed = rx.changed() => changed.is_ok(),
        };
        if !sender_alive {
            // Nobody can signal a stop any more.
            self.stop = None;
            tokio::time::sleep(duration).await;
        }
    }
}

fn log_skip(symbol: &Symbol, pass: &str, e: &Error) {
    match e {
        Error::InvariantViolation(_) => error!(%symbol, pass, "🚨 {}", e),
        _ => error!(%symbol, pass, "{}", e),
    }
}
