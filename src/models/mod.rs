use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// OHLCV candlestick for the traded contract
///
/// Timestamps are in a single timezone (exchange-local after any feed offset
/// has been applied).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Time-of-day of the candle's timestamp
    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

/// Broker position row for one symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub position: f64, // Signed: >0 long, <0 short, 0 flat (row kept after close)
}

/// Role of a leg within a bracket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderRole {
    Entry,
    Target,
    Stop,
}

/// Resting order reported by the broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OpenOrderSnapshot {
    pub order_id: i64,
    pub symbol: String,
    pub role: OrderRole,
    pub perm_id: i64, // Broker-assigned permanent id
}

/// Execution as the broker delivers it, with all details in free text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RawExecution {
    pub details: String,
}

/// Execution parsed and attributed to an owning client id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRecord {
    pub client_id: i32,
    pub avg_price: f64,
    pub details: String,
}

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Action that opens a position on this side
    pub fn entry_action(self) -> OrderAction {
        match self {
            Side::Long => OrderAction::Buy,
            Side::Short => OrderAction::Sell,
        }
    }

    /// Action that closes a position on this side
    pub fn exit_action(self) -> OrderAction {
        match self {
            Side::Long => OrderAction::Sell,
            Side::Short => OrderAction::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderAction {
    Buy,
    Sell,
}

/// Price instruction of a single order leg
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderKind {
    StopLimit { stop: f64, limit: f64 },
    Limit { price: f64 },
    Stop { price: f64 },
}

/// One leg of a bracket as handed to the broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLeg {
    pub order_id: i64,
    pub parent_id: Option<i64>,
    pub action: OrderAction,
    pub kind: OrderKind,
    pub quantity: u32,
    pub role: OrderRole,
    pub oca_group: Option<String>,
    pub transmit: bool, // Only the last leg of a bracket transmits the group
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_candle_time_of_day() {
        let candle = Candle {
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 3)
                .unwrap()
                .and_hms_opt(7, 35, 0)
                .unwrap(),
            open: 21000.0,
            high: 21010.0,
            low: 20990.0,
            close: 21005.0,
            volume: 1200.0,
        };

        assert_eq!(candle.time(), NaiveTime::from_hms_opt(7, 35, 0).unwrap());
    }

    #[test]
    fn test_side_actions() {
        assert_eq!(Side::Long.entry_action(), OrderAction::Buy);
        assert_eq!(Side::Long.exit_action(), OrderAction::Sell);
        assert_eq!(Side::Short.entry_action(), OrderAction::Sell);
        assert_eq!(Side::Short.exit_action(), OrderAction::Buy);
    }
}
