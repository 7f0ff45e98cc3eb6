//! Kite Intraday - Core Library
//! Prediction-driven intraday equity trading loop

// Public modules
pub mod core;
pub mod engine;
pub mod exchanges;
pub mod exclusions;
pub mod execution;
pub mod feeds;
pub mod journal;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use core::{Config, Error, Result};
