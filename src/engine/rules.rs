//! Entry sizing and exit triggers - the pure decision half of the loop

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::core::Position;

/// Why a position is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Target,
    Stop,
    Flatten,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Target => write!(f, "target"),
            ExitReason::Stop => write!(f, "stop"),
            ExitReason::Flatten => write!(f, "flatten"),
        }
    }
}

/// Profit target and stop loss, both as fractions of entry price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRules {
    profit_target: Decimal,
    stop_loss: Decimal,
}

impl ExitRules {
    pub fn new(profit_target: Decimal, stop_loss: Decimal) -> Self {
        Self {
            profit_target,
            stop_loss,
        }
    }

    pub fn profit_target(&self) -> Decimal {
        self.profit_target
    }

    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    /// Exit trigger for `position` at `price`, if any.
    ///
    /// Target and stop are inclusive. The flatten cutoff wins over both so the
    /// journal records why the position was actually forced out.
    pub fn exit_reason(&self, position: &Position, price: Decimal, flatten: bool) -> Option<ExitReason> {
        if flatten {
            Some(ExitReason::Flatten)
        } else if price >= position.target_price {
            Some(ExitReason::Target)
        } else if price <= position.stop_price {
            Some(ExitReason::Stop)
        } else {
            None
        }
    }
}

/// Whole shares affordable with `wallet` at `price`.
///
/// `None` for a bad quote, an unaffordable share, or a quantity that
/// overflows.
pub fn size_entry(wallet: Decimal, price: Decimal) -> Option<u64> {
    if price <= Decimal::ZERO || wallet < price {
        return None;
    }
    let qty = wallet.checked_div(price)?.floor().to_u64()?;
    (qty >= 1).then_some(qty)
}
