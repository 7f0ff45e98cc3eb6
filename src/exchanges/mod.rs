//! Broker gateway implementations

pub mod kite;

pub use kite::KiteGateway;
