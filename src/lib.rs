// Core modules
pub mod backtest;
pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod risk;
pub mod snapshot;
pub mod strategy;

// Re-export commonly used types
pub use error::OrbError;
pub use models::*;
pub use snapshot::BrokerSnapshot;
pub use strategy::{Action, Decision, DecisionEngine, OrbConfig};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
