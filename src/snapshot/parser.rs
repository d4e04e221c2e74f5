use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

macro_rules! re {
    ($pat:expr) => {
        LazyLock::new(|| Regex::new($pat).unwrap())
    };
}

static RE_AVG_PRICE: LazyLock<Regex> = re!(r"AvgPrice:\s*([0-9]+(?:\.[0-9]*)?|\.[0-9]+)");
static RE_CLIENT_ID: LazyLock<Regex> = re!(r"ClientId:\s*(-?[0-9]+)");

/// Fields extracted from a broker execution detail string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedExecution {
    pub avg_price: f64,
    pub client_id: i32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionParseError {
    #[error("no AvgPrice field in execution details")]
    MissingAvgPrice,

    #[error("no ClientId field in execution details")]
    MissingClientId,

    #[error("invalid {field} value '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// Parse `AvgPrice: <decimal>` and `ClientId: <integer>` out of an execution
/// detail string.
pub fn parse_execution_details(details: &str) -> Result<ParsedExecution, ExecutionParseError> {
    let price_raw = RE_AVG_PRICE
        .captures(details)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or(ExecutionParseError::MissingAvgPrice)?;

    let client_raw = RE_CLIENT_ID
        .captures(details)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or(ExecutionParseError::MissingClientId)?;

    let avg_price = price_raw
        .parse::<f64>()
        .map_err(|_| ExecutionParseError::InvalidNumber {
            field: "AvgPrice",
            value: price_raw.to_string(),
        })?;

    let client_id = client_raw
        .parse::<i32>()
        .map_err(|_| ExecutionParseError::InvalidNumber {
            field: "ClientId",
            value: client_raw.to_string(),
        })?;

    Ok(ParsedExecution {
        avg_price,
        client_id,
    })
}
