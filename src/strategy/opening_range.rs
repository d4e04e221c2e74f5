use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::models::Candle;

/// High/low of the designated early candle, used as breakout levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OpeningRange {
    pub high: f64,
    pub low: f64,
    pub candle_time: NaiveTime,
}

impl OpeningRange {
    /// Range width (stop size)
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Opening range as seen at the anchor candle
    ///
    /// Only defined when the most recent candle's time-of-day equals `anchor`;
    /// the range is then the candle immediately before it. Returns `None` on
    /// any other cycle, including when the feed has not delivered the anchor
    /// candle yet.
    pub fn at_anchor(candles: &[Candle], anchor: NaiveTime) -> Option<Self> {
        let (latest, earlier) = candles.split_last()?;
        if latest.time() != anchor {
            return None;
        }

        let range_candle = earlier.last()?;
        Some(Self::from_candle(range_candle))
    }

    /// Re-read the range from the latest candle stamped exactly `range_time`
    ///
    /// Used after the anchor cycle has passed, when the live range is no
    /// longer available.
    pub fn from_range_candle(candles: &[Candle], range_time: NaiveTime) -> Option<Self> {
        candles
            .iter()
            .rev()
            .find(|c| c.time() == range_time)
            .map(Self::from_candle)
    }

    fn from_candle(candle: &Candle) -> Self {
        Self {
            high: candle.high,
            low: candle.low,
            candle_time: candle.time(),
        }
    }
}
