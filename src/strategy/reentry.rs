use super::{Bracket, OpeningRange};
use crate::models::Side;

/// Result of looking at a closed first trade
#[derive(Debug, Clone, PartialEq)]
pub enum ReentryOutcome {
    /// First trade hit its stop; re-enter on the same side
    StoppedOut(Bracket),
    /// First trade closed on its profit target
    ProfitTarget { side: Side },
    /// Entry fill is near neither range boundary
    AmbiguousDirection,
}

/// Decides whether a closed first trade earns a single re-entry
#[derive(Debug, Clone)]
pub struct ReentryEvaluator {
    tolerance: f64,
    profit_multiplier: f64,
}

impl ReentryEvaluator {
    pub fn new(tolerance: f64, profit_multiplier: f64) -> Self {
        Self {
            tolerance,
            profit_multiplier,
        }
    }

    /// Infer the side the entry fill broke out on
    ///
    /// Band edges are inclusive (`>=` / `<=`), not the strict `>` / `<` a
    /// plain band check would use: a fill exactly `tolerance` inside the
    /// breakout level still counts, so an entry at 21000 against a
    /// 21005 / 20995 range with tolerance 5 reads as long. Stop-out
    /// checks below stay strict. Long is checked first, so with a range
    /// narrower than twice the tolerance an entry inside both bands reads
    /// as long.
    pub fn infer_side(&self, entry_fill: f64, range: &OpeningRange) -> Option<Side> {
        if entry_fill >= range.high - self.tolerance {
            Some(Side::Long)
        } else if entry_fill <= range.low + self.tolerance {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Whether the exit fill sits at the stop side of the range
    pub fn is_stopped_out(&self, side: Side, exit_fill: f64, range: &OpeningRange) -> bool {
        match side {
            Side::Long => exit_fill < range.low + self.tolerance,
            Side::Short => exit_fill > range.high - self.tolerance,
        }
    }

    /// Evaluate entry/exit fills of the first trade against the anchor range
    pub fn evaluate(
        &self,
        entry_fill: f64,
        exit_fill: f64,
        range: &OpeningRange,
        quantity: u32,
    ) -> ReentryOutcome {
        let Some(side) = self.infer_side(entry_fill, range) else {
            return ReentryOutcome::AmbiguousDirection;
        };

        if self.is_stopped_out(side, exit_fill, range) {
            ReentryOutcome::StoppedOut(Bracket::for_side(
                side,
                range,
                quantity,
                self.profit_multiplier,
            ))
        } else {
            ReentryOutcome::ProfitTarget { side }
        }
    }
}

impl Default for ReentryEvaluator {
    fn default() -> Self {
        Self::new(5.0, 2.0)
    }
}
