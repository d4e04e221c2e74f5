use chrono::NaiveTime;

use crate::snapshot::BrokerSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// Cancel this order; the broker's OCA handling takes the siblings down
    Cancel { order_id: i64 },
    /// Conditions for a stale bracket are not all met
    NotApplicable,
    /// Snapshot breaks the one-position-row-per-symbol invariant
    InvariantViolation(String),
}

/// Cancels an untriggered bracket once the day is too late to trade it
#[derive(Debug, Clone)]
pub struct StaleOrderCanceller {
    cutoff: NaiveTime,
    bracket_order_count: usize,
}

impl StaleOrderCanceller {
    pub fn new(cutoff: NaiveTime, bracket_order_count: usize) -> Self {
        Self {
            cutoff,
            bracket_order_count,
        }
    }

    /// Pick the resting order to cancel, if any
    ///
    /// Applies at or after the cutoff, with exactly one bracket group resting
    /// and a flat position. A missing position row counts as flat.
    pub fn evaluate(&self, snapshot: &BrokerSnapshot, symbol: &str, now: NaiveTime) -> CancelOutcome {
        if now < self.cutoff || snapshot.open_orders().len() != self.bracket_order_count {
            return CancelOutcome::NotApplicable;
        }

        let position = match snapshot.position_for(symbol) {
            Ok(Some(position)) => position,
            Ok(None) => {
                tracing::debug!("No position row for {}, treating as flat", symbol);
                0.0
            }
            Err(e) => return CancelOutcome::InvariantViolation(e.to_string()),
        };

        if position != 0.0 {
            return CancelOutcome::NotApplicable;
        }

        match snapshot.orders_for(symbol).next() {
            Some(order) => CancelOutcome::Cancel {
                order_id: order.order_id,
            },
            None => CancelOutcome::NotApplicable,
        }
    }
}
