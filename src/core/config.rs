//! Configuration - Type-safe, validated config
//!
//! Loads from `config.toml` at the working directory. Every field has a
//! default, so a missing file or a partial file both yield a usable config.

use chrono::NaiveTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{Error, Result};
use crate::engine::rules::ExitRules;
use crate::engine::session::TradingSession;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Market hours
    #[serde(default)]
    pub session: SessionConfig,

    /// Sizing, exits and polling
    #[serde(default)]
    pub trading: TradingConfig,

    /// Input and output files
    #[serde(default)]
    pub paths: PathsConfig,

    /// Broker connection
    #[serde(default)]
    pub kite: KiteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// IANA timezone of the exchange
    pub timezone: String,

    /// First time of day at which cycles evaluate (inclusive)
    pub open: NaiveTime,

    /// Last time of day at which cycles evaluate (inclusive)
    pub close: NaiveTime,

    /// From this time on every open position is flattened
    pub flatten_at: NaiveTime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Kolkata".to_string(),
            open: hms(9, 30),
            close: hms(15, 15),
            flatten_at: hms(15, 10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Take profit as fraction of entry price (0.02 = 2%)
    #[serde(default = "default_profit_target")]
    pub profit_target: f64,

    /// Stop loss as fraction of entry price (0.01 = 1%)
    #[serde(default = "default_stop_loss")]
    pub stop_loss: f64,

    /// Seconds between cycles inside the window
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,

    /// Lower bound applied to any requested poll interval
    #[serde(default = "default_min_poll_seconds")]
    pub min_poll_seconds: u64,

    /// Lower bound for the sleep outside the window
    #[serde(default = "default_idle_poll_seconds")]
    pub idle_poll_seconds: u64,

    /// Upper bound on any single broker call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_profit_target() -> f64 {
    0.02
}
fn default_stop_loss() -> f64 {
    0.01
}
fn default_poll_seconds() -> u64 {
    30
}
fn default_min_poll_seconds() -> u64 {
    5
}
fn default_idle_poll_seconds() -> u64 {
    15
}
fn default_request_timeout() -> u64 {
    10
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            profit_target: default_profit_target(),
            stop_loss: default_stop_loss(),
            poll_seconds: default_poll_seconds(),
            min_poll_seconds: default_min_poll_seconds(),
            idle_poll_seconds: default_idle_poll_seconds(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Daily `{date, stocks}` artifact
    pub predictions: PathBuf,

    /// Operator-maintained `{stocks}` exclusion list
    pub exclusions: PathBuf,

    /// JSON Lines trade journal
    pub journal: PathBuf,

    /// Directory for `app.log`
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            predictions: PathBuf::from("predictions.json"),
            exclusions: PathBuf::from("excluded.json"),
            journal: PathBuf::from("logs/trades.jsonl"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KiteConfig {
    /// REST root
    pub base_url: String,

    /// Exchange segment orders are routed to
    pub exchange: String,

    /// Product type (MIS = intraday)
    pub product: String,

    /// API key (loaded from env if not provided)
    pub api_key: Option<String>,

    /// Access token (loaded from env if not provided)
    pub access_token: Option<String>,
}

impl Default for KiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.kite.trade".to_string(),
            exchange: "NSE".to_string(),
            product: "MIS".to_string(),
            api_key: None,
            access_token: None,
        }
    }
}

impl KiteConfig {
    /// Resolve `(api_key, access_token)` from config or `KITE_API_KEY` / `KITE_ACCESS_TOKEN`.
    pub fn credentials(&self) -> Result<(String, String)> {
        let key = resolve_secret(self.api_key.as_deref(), "KITE_API_KEY");
        let token = resolve_secret(self.access_token.as_deref(), "KITE_ACCESS_TOKEN");

        match (key, token) {
            (Some(key), Some(token)) => Ok((key, token)),
            (key, token) => {
                let mut missing = vec![];
                if key.is_none() {
                    missing.push("KITE_API_KEY");
                }
                if token.is_none() {
                    missing.push("KITE_ACCESS_TOKEN");
                }
                Err(Error::Config(format!(
                    "Missing required credentials: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

fn resolve_secret(configured: Option<&str>, env_key: &str) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var(env_key).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn hms(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

impl Config {
    /// Load from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.trading;
        if !(t.profit_target > 0.0 && t.profit_target < 1.0) {
            return Err(Error::Config(format!(
                "profit_target must be in (0, 1), got {}",
                t.profit_target
            )));
        }
        if !(t.stop_loss > 0.0 && t.stop_loss < 1.0) {
            return Err(Error::Config(format!(
                "stop_loss must be in (0, 1), got {}",
                t.stop_loss
            )));
        }
        if t.min_poll_seconds == 0 {
            return Err(Error::Config("min_poll_seconds must be positive".into()));
        }
        if t.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }

        // Builds and checks window ordering.
        self.session()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.session.timezone.parse::<Tz>().map_err(|e| {
            Error::Config(format!("Unknown timezone {}: {}", self.session.timezone, e))
        })
    }

    pub fn session(&self) -> Result<TradingSession> {
        TradingSession::new(
            self.timezone()?,
            self.session.open,
            self.session.close,
            self.session.flatten_at,
        )
    }

    pub fn exit_rules(&self) -> Result<ExitRules> {
        let target = Decimal::try_from(self.trading.profit_target)
            .map_err(|e| Error::Config(format!("profit_target: {}", e)))?;
        let stop = Decimal::try_from(self.trading.stop_loss)
            .map_err(|e| Error::Config(format!("stop_loss: {}", e)))?;
        Ok(ExitRules::new(target, stop))
    }

    /// Effective in-window interval: the requested one, never below the floor.
    pub fn poll_interval(&self, requested_secs: Option<u64>) -> Duration {
        let requested = requested_secs.unwrap_or(self.trading.poll_seconds);
        Duration::from_secs(requested.max(self.trading.min_poll_seconds))
    }

    /// Out-of-window interval: never shorter than the in-window one.
    pub fn idle_interval(&self, poll: Duration) -> Duration {
        poll.max(Duration::from_secs(self.trading.idle_poll_seconds))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.trading.request_timeout_secs)
    }
}
