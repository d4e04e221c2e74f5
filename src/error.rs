use thiserror::Error;

use crate::snapshot::ExecutionParseError;

/// Domain errors surfaced by the bot outside the pure decision path
#[derive(Debug, Error)]
pub enum OrbError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Execution parse error: {0}")]
    ExecutionParse(#[from] ExecutionParseError),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Expected at most one position row for {symbol}, found {rows}")]
    DuplicatePosition { symbol: String, rows: usize },

    #[error("No valid order id after {attempts} attempts")]
    OrderIdUnavailable { attempts: u32 },

    #[error("Failed to read performance records: {0}")]
    Performance(String),

    #[error("Broker error: {0}")]
    Broker(String),
}
