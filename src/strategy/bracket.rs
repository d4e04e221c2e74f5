use serde::{Deserialize, Serialize};

use super::OpeningRange;
use crate::models::{OrderKind, OrderLeg, OrderRole, Side};

/// Entry/target/stop prices for both breakout sides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BracketPlan {
    pub quantity: u32,
    pub long_entry: f64,
    pub long_target: f64,
    pub long_stop: f64,
    pub short_entry: f64,
    pub short_target: f64,
    pub short_stop: f64,
}

/// A single-sided bracket: entry, profit target, stop loss
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bracket {
    pub side: Side,
    pub quantity: u32,
    pub entry: f64,
    pub target: f64,
    pub stop: f64,
}

impl BracketPlan {
    /// Derive both brackets from the opening range
    ///
    /// Target distance is `multiplier * (high - low)` beyond the breakout
    /// level; each side's stop is the opposite range boundary.
    pub fn new(range: &OpeningRange, quantity: u32, multiplier: f64) -> Self {
        let stop_size = range.width();

        Self {
            quantity,
            long_entry: range.high,
            long_target: range.high + stop_size * multiplier,
            long_stop: range.low,
            short_entry: range.low,
            short_target: range.low - stop_size * multiplier,
            short_stop: range.high,
        }
    }

    pub fn long(&self) -> Bracket {
        Bracket {
            side: Side::Long,
            quantity: self.quantity,
            entry: self.long_entry,
            target: self.long_target,
            stop: self.long_stop,
        }
    }

    pub fn short(&self) -> Bracket {
        Bracket {
            side: Side::Short,
            quantity: self.quantity,
            entry: self.short_entry,
            target: self.short_target,
            stop: self.short_stop,
        }
    }

    /// Legs for both brackets with the two entries in one OCA group
    ///
    /// Long bracket takes ids `order_id..order_id+2`, short bracket the next
    /// three.
    pub fn oca_legs(&self, order_id: i64, oca_group: &str) -> Vec<OrderLeg> {
        let mut legs = self.long().legs(order_id);
        legs.extend(self.short().legs(order_id + 3));

        for leg in legs.iter_mut().filter(|l| l.role == OrderRole::Entry) {
            leg.oca_group = Some(oca_group.to_string());
        }
        legs
    }
}

impl Bracket {
    /// Bracket for `side` off an opening range
    pub fn for_side(side: Side, range: &OpeningRange, quantity: u32, multiplier: f64) -> Self {
        let plan = BracketPlan::new(range, quantity, multiplier);
        match side {
            Side::Long => plan.long(),
            Side::Short => plan.short(),
        }
    }

    /// Parent entry plus target and stop children with consecutive ids
    ///
    /// Entry is a stop-limit at the breakout level. Only the last child
    /// transmits, so the broker activates the group atomically.
    pub fn legs(&self, order_id: i64) -> Vec<OrderLeg> {
        let exit = self.side.exit_action();

        vec![
            OrderLeg {
                order_id,
                parent_id: None,
                action: self.side.entry_action(),
                kind: OrderKind::StopLimit {
                    stop: self.entry,
                    limit: self.entry,
                },
                quantity: self.quantity,
                role: OrderRole::Entry,
                oca_group: None,
                transmit: false,
            },
            OrderLeg {
                order_id: order_id + 1,
                parent_id: Some(order_id),
                action: exit,
                kind: OrderKind::Limit { price: self.target },
                quantity: self.quantity,
                role: OrderRole::Target,
                oca_group: None,
                transmit: false,
            },
            OrderLeg {
                order_id: order_id + 2,
                parent_id: Some(order_id),
                action: exit,
                kind: OrderKind::Stop { price: self.stop },
                quantity: self.quantity,
                role: OrderRole::Stop,
                oca_group: None,
                transmit: true,
            },
        ]
    }
}
