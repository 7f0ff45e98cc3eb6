//! Trading window - which times of day the loop trades and when it flattens

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::core::{Error, Result};

/// Exchange-local trading window with an end-of-day flatten cutoff.
///
/// `open..=close` gates evaluation. From `flatten_at` onward every open
/// position is exited regardless of P/L; `flatten_at` lies strictly inside
/// the window so at least one flatten pass runs before the close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingSession {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
    flatten_at: NaiveTime,
}

impl TradingSession {
    pub fn new(tz: Tz, open: NaiveTime, close: NaiveTime, flatten_at: NaiveTime) -> Result<Self> {
        if open >= close {
            return Err(Error::Config(format!(
                "session open {} must be before close {}",
                open, close
            )));
        }
        if flatten_at <= open || flatten_at >= close {
            return Err(Error::Config(format!(
                "flatten_at {} must fall strictly between open {} and close {}",
                flatten_at, open, close
            )));
        }
        Ok(Self {
            tz,
            open,
            close,
            flatten_at,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn is_open(&self, t: NaiveTime) -> bool {
        self.open <= t && t <= self.close
    }

    pub fn must_flatten(&self, t: NaiveTime) -> bool {
        t >= self.flatten_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn nse() -> TradingSession {
        TradingSession::new(
            chrono_tz::Asia::Kolkata,
            hms(9, 30, 0),
            hms(15, 15, 0),
            hms(15, 10, 0),
        )
        .unwrap()
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let s = nse();
        assert!(!s.is_open(hms(9, 29, 59)));
        assert!(s.is_open(hms(9, 30, 0)));
        assert!(s.is_open(hms(12, 0, 0)));
        assert!(s.is_open(hms(15, 15, 0)));
        assert!(!s.is_open(hms(15, 15, 1)));
    }

    #[test]
    fn test_flatten_cutoff() {
        let s = nse();
        assert!(!s.must_flatten(hms(15, 9, 59)));
        assert!(s.must_flatten(hms(15, 10, 0)));
        assert!(s.must_flatten(hms(15, 14, 0)));
    }

    #[test]
    fn test_rejects_inverted_window() {
        let tz = chrono_tz::Asia::Kolkata;
        assert!(TradingSession::new(tz, hms(15, 0, 0), hms(9, 0, 0), hms(10, 0, 0)).is_err());
        assert!(TradingSession::new(tz, hms(9, 0, 0), hms(15, 0, 0), hms(9, 0, 0)).is_err());
    }
}
