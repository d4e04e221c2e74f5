use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::{OpeningRange, ReentryEvaluator, ReentryOutcome};
use crate::snapshot::BrokerSnapshot;

/// Where the day's trading stands, reconstructed from broker snapshots
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeAttemptState {
    NoAttempt,
    InitialOrderPlaced,
    InPosition,
    ClosedStoppedOut,
    ClosedOnTarget,
    ReentryPlaced,
    ReentryClosed,
    /// Flat with nothing resting and no re-entry left: either nothing
    /// filled, or the first trade stopped out and the cancel cutoff passed
    Cancelled,
    /// Two fills that cannot be classified (no anchor candle, ambiguous side)
    Indeterminate,
}

/// Reconstruct the day's state from one cycle's snapshot
///
/// Pure: depends only on position/order/execution counts and, for a closed
/// first trade, on the fill prices read against the anchor-day range and on
/// the session time `now` against `cancel_cutoff`. Without a session time a
/// stopped-out trade stays `ClosedStoppedOut`.
pub fn derive_state(
    snapshot: &BrokerSnapshot,
    anchor_range: Option<&OpeningRange>,
    evaluator: &ReentryEvaluator,
    now: Option<NaiveTime>,
    cancel_cutoff: NaiveTime,
) -> TradeAttemptState {
    let past_cutoff = now.is_some_and(|t| t >= cancel_cutoff);
    let fills = snapshot.fill_prices();
    let has_orders = !snapshot.open_orders().is_empty();
    let has_positions = !snapshot.positions().is_empty();

    match fills.as_slice() {
        [] if has_orders => TradeAttemptState::InitialOrderPlaced,
        [] if has_positions => TradeAttemptState::Cancelled,
        [] => TradeAttemptState::NoAttempt,
        [_] => TradeAttemptState::InPosition,
        [_, _] if has_orders => TradeAttemptState::ReentryPlaced,
        [entry, exit] => match anchor_range {
            // Quantity is irrelevant for classification
            Some(range) => match evaluator.evaluate(*entry, *exit, range, 0) {
                ReentryOutcome::StoppedOut(_) if past_cutoff => TradeAttemptState::Cancelled,
                ReentryOutcome::StoppedOut(_) => TradeAttemptState::ClosedStoppedOut,
                ReentryOutcome::ProfitTarget { .. } => TradeAttemptState::ClosedOnTarget,
                ReentryOutcome::AmbiguousDirection => TradeAttemptState::Indeterminate,
            },
            None => TradeAttemptState::Indeterminate,
        },
        many if many.len() % 2 == 1 => TradeAttemptState::InPosition,
        _ => TradeAttemptState::ReentryClosed,
    }
}
