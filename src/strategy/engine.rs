use chrono::NaiveTime;
use std::fmt;

use super::cancel::{CancelOutcome, StaleOrderCanceller};
use super::{
    derive_state, Bracket, BracketPlan, OpeningRange, OrbConfig, ReentryEvaluator,
    ReentryOutcome, TradeAttemptState,
};
use crate::models::Candle;
use crate::snapshot::BrokerSnapshot;

/// What the cycle asks the broker to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Long and short brackets joined by an OCA group on their entries
    PlaceInitialBracket(BracketPlan),
    PlaceReentryBracket(Bracket),
    CancelOrder { order_id: i64 },
    NoOp(NoOpReason),
}

/// Why a cycle produced no order activity
#[derive(Debug, Clone, PartialEq)]
pub enum NoOpReason {
    NoCandles,
    ZeroQuantity,
    ExistingActivity { positions: usize, orders: usize },
    AnchorCandleMissing,
    AmbiguousDirection,
    ClosedOnTarget,
    InvariantViolation(String),
    NothingToDo,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NoOpReason::NoCandles => write!(f, "No candle data yet this cycle"),
            NoOpReason::ZeroQuantity => write!(f, "Contract size is zero, order suppressed"),
            NoOpReason::ExistingActivity { positions, orders } => write!(
                f,
                "Already traded today ({} position rows, {} open orders)",
                positions, orders
            ),
            NoOpReason::AnchorCandleMissing => {
                write!(f, "Range candle not in series, cannot evaluate re-entry")
            }
            NoOpReason::AmbiguousDirection => {
                write!(f, "Entry fill near neither range boundary, re-entry suppressed")
            }
            NoOpReason::ClosedOnTarget => write!(f, "First trade hit profit target"),
            NoOpReason::InvariantViolation(msg) => write!(f, "Invariant violated: {}", msg),
            NoOpReason::NothingToDo => write!(f, "No conditions met"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub action: Action,
    pub state: TradeAttemptState,
    pub reason: String,
}

impl Decision {
    fn act(action: Action, state: TradeAttemptState, reason: impl Into<String>) -> Self {
        Self {
            action,
            state,
            reason: reason.into(),
        }
    }

    fn no_op(reason: NoOpReason, state: TradeAttemptState) -> Self {
        let text = reason.to_string();
        Self {
            action: Action::NoOp(reason),
            state,
            reason: text,
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self.action, Action::NoOp(_))
    }
}

/// Everything one decision needs, already extracted from the feeds
#[derive(Debug, Clone)]
pub struct DecisionContext<'a> {
    pub snapshot: &'a BrokerSnapshot,
    pub now: NaiveTime,
    /// Present only on the anchor cycle
    pub opening_range: Option<OpeningRange>,
    pub plan: Option<BracketPlan>,
    /// Range re-read from the range candle, for re-entry
    pub anchor_range: Option<OpeningRange>,
    pub quantity: u32,
}

/// Opening range breakout decision rules
///
/// Holds configuration only. Every call decides from its inputs alone, so a
/// restarted process picks up where the broker state says the day is.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: OrbConfig,
    symbol: String,
    reentry: ReentryEvaluator,
    canceller: StaleOrderCanceller,
}

impl DecisionEngine {
    pub fn new(config: OrbConfig, symbol: impl Into<String>) -> Self {
        let reentry = ReentryEvaluator::new(config.price_tolerance, config.profit_multiplier);
        let canceller =
            StaleOrderCanceller::new(config.cancel_cutoff, config.stale_bracket_order_count);

        Self {
            config,
            symbol: symbol.into(),
            reentry,
            canceller,
        }
    }

    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Build the decision context from the session's candles
    ///
    /// `None` when the feed has not produced any candle yet.
    pub fn context<'a>(
        &self,
        snapshot: &'a BrokerSnapshot,
        candles: &[Candle],
        quantity: u32,
    ) -> Option<DecisionContext<'a>> {
        let latest = candles.last()?;

        let opening_range = OpeningRange::at_anchor(candles, self.config.anchor_time);
        let plan = opening_range
            .as_ref()
            .map(|r| BracketPlan::new(r, quantity, self.config.profit_multiplier));
        let anchor_range = OpeningRange::from_range_candle(candles, self.config.range_candle_time);

        if let Some(range) = &opening_range {
            tracing::info!(
                "Time conditions met, range candle {}: high ${:.2}, low ${:.2}",
                range.candle_time,
                range.high,
                range.low
            );
        }

        Some(DecisionContext {
            snapshot,
            now: latest.time(),
            opening_range,
            plan,
            anchor_range,
            quantity,
        })
    }

    /// Decide this cycle's action from a snapshot and the session candles
    pub fn evaluate(&self, snapshot: &BrokerSnapshot, candles: &[Candle], quantity: u32) -> Decision {
        match self.context(snapshot, candles, quantity) {
            Some(ctx) => self.decide(&ctx),
            None => {
                let state =
                    derive_state(snapshot, None, &self.reentry, None, self.config.cancel_cutoff);
                Decision::no_op(NoOpReason::NoCandles, state)
            }
        }
    }

    /// Apply the rules in precedence order: initial entry, re-entry,
    /// stale-order cancel, no-op
    pub fn decide(&self, ctx: &DecisionContext) -> Decision {
        let snapshot = ctx.snapshot;
        let state = derive_state(
            snapshot,
            ctx.anchor_range.as_ref(),
            &self.reentry,
            Some(ctx.now),
            self.config.cancel_cutoff,
        );
        let positions = snapshot.positions().len();
        let orders = snapshot.open_orders().len();

        tracing::debug!(
            "Deciding at {}: state {:?}, {} positions, {} orders, {} fills",
            ctx.now,
            state,
            positions,
            orders,
            snapshot.executions().len()
        );

        // Rule 1: initial entry, only with nothing traded or resting
        if let Some(plan) = &ctx.plan {
            if positions == 0 && orders == 0 {
                if ctx.quantity == 0 {
                    return Decision::no_op(NoOpReason::ZeroQuantity, state);
                }
                return Decision::act(
                    Action::PlaceInitialBracket(plan.clone()),
                    state,
                    format!(
                        "Opening range set, OCA brackets at {:.2} / {:.2}",
                        plan.long_entry, plan.short_entry
                    ),
                );
            }
        }

        // Rule 2: re-entry after a closed first trade
        if positions > 0
            && snapshot.executions().len() == 2
            && orders == 0
            && ctx.now < self.config.reentry_cutoff
        {
            return self.decide_reentry(ctx, state);
        }

        // Rule 3: stale bracket cancel
        match self.canceller.evaluate(snapshot, &self.symbol, ctx.now) {
            CancelOutcome::Cancel { order_id } => {
                return Decision::act(
                    Action::CancelOrder { order_id },
                    state,
                    format!("Bracket not triggered by {}", self.config.cancel_cutoff),
                );
            }
            CancelOutcome::InvariantViolation(msg) => {
                tracing::warn!("Skipping stale order check: {}", msg);
                return Decision::no_op(NoOpReason::InvariantViolation(msg), state);
            }
            CancelOutcome::NotApplicable => {}
        }

        if ctx.plan.is_some() {
            return Decision::no_op(NoOpReason::ExistingActivity { positions, orders }, state);
        }
        Decision::no_op(NoOpReason::NothingToDo, state)
    }

    fn decide_reentry(&self, ctx: &DecisionContext, state: TradeAttemptState) -> Decision {
        let Some(range) = &ctx.anchor_range else {
            tracing::warn!(
                "No {} candle in series, cannot evaluate re-entry",
                self.config.range_candle_time
            );
            return Decision::no_op(NoOpReason::AnchorCandleMissing, state);
        };

        let fills = ctx.snapshot.fill_prices();
        let (entry, exit) = (fills[0], fills[1]);

        match self.reentry.evaluate(entry, exit, range, ctx.quantity) {
            ReentryOutcome::StoppedOut(bracket) => {
                if ctx.quantity == 0 {
                    return Decision::no_op(NoOpReason::ZeroQuantity, state);
                }
                let reason = format!(
                    "{:?} stopped out (entry {:.2}, exit {:.2}), re-entering at {:.2}",
                    bracket.side, entry, exit, bracket.entry
                );
                Decision::act(Action::PlaceReentryBracket(bracket), state, reason)
            }
            ReentryOutcome::ProfitTarget { side } => {
                tracing::debug!("{:?} trade closed on target at {:.2}", side, exit);
                Decision::no_op(NoOpReason::ClosedOnTarget, state)
            }
            ReentryOutcome::AmbiguousDirection => {
                tracing::warn!(
                    "Entry fill {:.2} not near range {:.2}-{:.2}, no re-entry today",
                    entry,
                    range.low,
                    range.high
                );
                Decision::no_op(NoOpReason::AmbiguousDirection, state)
            }
        }
    }
}
