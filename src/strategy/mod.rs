// Opening range breakout strategy
pub mod bracket;
pub mod cancel;
pub mod engine;
pub mod opening_range;
pub mod reentry;
pub mod state;

pub use bracket::{Bracket, BracketPlan};
pub use engine::{Action, Decision, DecisionContext, DecisionEngine, NoOpReason};
pub use opening_range::OpeningRange;
pub use reentry::{ReentryEvaluator, ReentryOutcome};
pub use state::{derive_state, TradeAttemptState};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Configuration for the opening range breakout decision rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrbConfig {
    pub range_candle_time: NaiveTime, // Candle whose high/low define the range
    pub anchor_time: NaiveTime,       // Latest candle time at which the range is taken
    pub reentry_cutoff: NaiveTime,    // Re-entry only strictly before this
    pub cancel_cutoff: NaiveTime,     // Stale brackets cancelled at or after this
    pub price_tolerance: f64,         // Slack for direction/stop-out inference
    pub profit_multiplier: f64,       // Target distance as a multiple of range width
    pub stale_bracket_order_count: usize,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            range_candle_time: hms(7, 30),
            anchor_time: hms(7, 35),
            reentry_cutoff: hms(13, 30),
            cancel_cutoff: hms(13, 30),
            price_tolerance: 5.0,
            profit_multiplier: 2.0,
            stale_bracket_order_count: 3, // One un-triggered bracket: entry, target, stop
        }
    }
}

fn hms(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
