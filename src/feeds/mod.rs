//! Input artifacts consumed by the trading loop

pub mod predictions;

pub use predictions::Predictions;
