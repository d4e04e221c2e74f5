use crate::models::Candle;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const TICK: f64 = 0.25;

/// Session shapes for synthetic replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SessionScenario {
    /// Breaks above the range and runs to the long target
    LongTarget,
    /// Breaks below the range and runs to the short target
    ShortTarget,
    /// Long stopped out at the range low, re-entry runs to target
    LongStopThenReentry,
    /// Long stopped out, re-entry never triggers before the cutoff
    StaleReentry,
    /// Never leaves the opening range after the anchor candle
    NoBreakout,
}

impl SessionScenario {
    pub fn all() -> [SessionScenario; 5] {
        [
            SessionScenario::LongTarget,
            SessionScenario::ShortTarget,
            SessionScenario::LongStopThenReentry,
            SessionScenario::StaleReentry,
            SessionScenario::NoBreakout,
        ]
    }
}

/// Opening range the generator builds a session around
#[derive(Debug, Clone, Copy)]
pub struct RangeLevels {
    pub high: f64,
    pub low: f64,
}

impl RangeLevels {
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Generates exchange-local five-minute sessions for one trading day
///
/// Bars run from 07:00 until the last bar before 14:00. The 07:30 bar sets the
/// range, the 07:35 bar stays inside it, and what follows depends on the
/// scenario. Prices are kept on a quarter-point tick.
pub struct SessionGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    date: NaiveDate,
    interval_minutes: i64,
    profit_multiplier: f64,
}

impl SessionGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 21_000.0,
            base_volume: 1_500.0,
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap_or_default(),
            interval_minutes: 5,
            profit_multiplier: 2.0,
        }
    }

    pub fn with_base_price(mut self, price: f64) -> Self {
        self.base_price = price;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Target distance the generated runs must reach, as a range multiple
    pub fn with_profit_multiplier(mut self, multiplier: f64) -> Self {
        self.profit_multiplier = multiplier;
        self
    }

    /// Build a session and return it with the range it was built around
    pub fn generate(&mut self, scenario: SessionScenario) -> (Vec<Candle>, RangeLevels) {
        // Even-point widths keep every quarter-range step on the tick grid
        let width = 2.0 * self.rng.gen_range(5..=10) as f64;
        let drift = round_tick(self.rng.gen_range(-40.0..40.0));
        let low = round_tick(self.base_price + drift - width / 2.0);
        let range = RangeLevels {
            high: low + width,
            low,
        };

        let mut bars: Vec<(f64, f64)> = Vec::new();

        // 07:00 - 07:25: pre-range noise
        for _ in 0..6 {
            let center = range.mid() + round_tick(self.rng.gen_range(-width..width));
            let half = round_tick(self.rng.gen_range(width / 4.0..width));
            bars.push((center + half, center - half));
        }
        // 07:30 range bar, 07:35 anchor bar inside it
        bars.push((range.high, range.low));
        bars.push(self.inside(&range));

        match scenario {
            SessionScenario::LongTarget => {
                self.run_to_target(&range, 1.0, &mut bars);
            }
            SessionScenario::ShortTarget => {
                self.run_to_target(&range, -1.0, &mut bars);
            }
            SessionScenario::LongStopThenReentry => {
                self.breakout_then_stop(&range, &mut bars);
                bars.push(self.inside(&range));
                self.run_to_target(&range, 1.0, &mut bars);
            }
            SessionScenario::StaleReentry => {
                self.breakout_then_stop(&range, &mut bars);
            }
            SessionScenario::NoBreakout => {}
        }

        // Fill the rest of the session; flat scenarios stay inside the range
        let total = self.bars_in_session();
        let mut last_center = bars.last().map(|(h, l)| (h + l) / 2.0).unwrap_or(range.mid());
        while bars.len() < total {
            match scenario {
                SessionScenario::StaleReentry | SessionScenario::NoBreakout => {
                    bars.push(self.inside(&range));
                }
                _ => {
                    last_center += round_tick(self.rng.gen_range(-width / 2.0..width / 2.0));
                    let half = round_tick(self.rng.gen_range(TICK..width / 2.0));
                    bars.push((last_center + half, last_center - half));
                }
            }
        }
        bars.truncate(total);

        let start = self.session_start();
        let candles = bars
            .into_iter()
            .enumerate()
            .map(|(i, (high, low))| {
                let timestamp = start + Duration::minutes(i as i64 * self.interval_minutes);
                self.create_candle(high, low, timestamp)
            })
            .collect();

        (candles, range)
    }

    fn session_start(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    fn bars_in_session(&self) -> usize {
        (7 * 60 / self.interval_minutes) as usize
    }

    /// A bar strictly inside the range
    fn inside(&mut self, range: &RangeLevels) -> (f64, f64) {
        let limit = range.width() / 2.0 - TICK;
        let up = round_down_tick(self.rng.gen_range(TICK..limit));
        let down = round_down_tick(self.rng.gen_range(TICK..limit));
        (range.mid() + up, range.mid() - down)
    }

    /// Breakout bar through the entry, then steady bars until the target trades
    ///
    /// Lows stay clear of the stop the whole way.
    fn run_to_target(&mut self, range: &RangeLevels, direction: f64, bars: &mut Vec<(f64, f64)>) {
        let width = range.width();
        let (entry, target) = if direction > 0.0 {
            (range.high, range.high + width * self.profit_multiplier)
        } else {
            (range.low, range.low - width * self.profit_multiplier)
        };

        let step = width / 2.0;
        let half = width / 4.0;
        let mut center = entry + direction * half;
        loop {
            bars.push((center + half, center - half));
            let reached = if direction > 0.0 {
                center + half >= target
            } else {
                center - half <= target
            };
            if reached {
                break;
            }
            center += direction * step;
        }
        // One more push through the target before the tape wanders off
        let overshoot = round_tick(self.rng.gen_range(TICK..width / 2.0));
        let far = target + direction * overshoot;
        bars.push(if direction > 0.0 {
            (far, target - half)
        } else {
            (target + half, far)
        });
    }

    /// Long breakout bar, then a bar down through the range low
    fn breakout_then_stop(&mut self, range: &RangeLevels, bars: &mut Vec<(f64, f64)>) {
        let width = range.width();
        bars.push((range.high + width / 2.0, range.high));
        let flush = round_tick(self.rng.gen_range(TICK..width / 2.0));
        bars.push((range.mid() + width / 4.0, range.low - flush));
    }

    /// Helper to create a candle with open and close inside the bar
    fn create_candle(&mut self, high: f64, low: f64, timestamp: NaiveDateTime) -> Candle {
        let open = round_tick(self.rng.gen_range(low..=high)).clamp(low, high);
        let close = round_tick(self.rng.gen_range(low..=high)).clamp(low, high);

        // Vary volume ±30%
        let volume = (self.base_volume * self.rng.gen_range(0.7..1.3)).round();

        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

fn round_tick(price: f64) -> f64 {
    (price / TICK).round() * TICK
}

fn round_down_tick(price: f64) -> f64 {
    (price / TICK).floor() * TICK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(candles: &[Candle], hour: u32, minute: u32) -> &Candle {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        candles.iter().find(|c| c.time() == time).unwrap()
    }

    #[test]
    fn test_session_layout() {
        let mut gen = SessionGenerator::new(42);
        let (candles, range) = gen.generate(SessionScenario::LongTarget);

        assert_eq!(candles.len(), 84);
        assert_eq!(candles[0].time(), NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(candles[83].time(), NaiveTime::from_hms_opt(13, 55, 0).unwrap());

        let range_bar = at(&candles, 7, 30);
        assert_eq!(range_bar.high, range.high);
        assert_eq!(range_bar.low, range.low);

        let anchor = at(&candles, 7, 35);
        assert!(anchor.high < range.high && anchor.low > range.low);
    }

    #[test]
    fn test_timestamps_are_sequential() {
        let mut gen = SessionGenerator::new(7);
        let (candles, _) = gen.generate(SessionScenario::LongStopThenReentry);

        for pair in candles.windows(2) {
            assert_eq!((pair[1].timestamp - pair[0].timestamp).num_minutes(), 5);
        }
    }

    #[test]
    fn test_ohlc_consistency() {
        for scenario in SessionScenario::all() {
            let mut gen = SessionGenerator::new(42);
            let (candles, _) = gen.generate(scenario);

            for candle in &candles {
                assert!(candle.high >= candle.close, "High should be >= close");
                assert!(candle.high >= candle.open, "High should be >= open");
                assert!(candle.low <= candle.close, "Low should be <= close");
                assert!(candle.low <= candle.open, "Low should be <= open");
            }
        }
    }

    #[test]
    fn test_long_target_reaches_target_without_touching_stop() {
        let mut gen = SessionGenerator::new(3);
        let (candles, range) = gen.generate(SessionScenario::LongTarget);
        let target = range.high + 2.0 * range.width();

        let after_anchor: Vec<&Candle> = candles.iter().skip(8).collect();
        let hit = after_anchor.iter().position(|c| c.high >= target).unwrap();
        assert!(after_anchor[..=hit].iter().all(|c| c.low > range.low));
    }

    #[test]
    fn test_no_breakout_stays_inside() {
        let mut gen = SessionGenerator::new(11);
        let (candles, range) = gen.generate(SessionScenario::NoBreakout);

        assert!(candles
            .iter()
            .skip(7)
            .all(|c| c.high < range.high && c.low > range.low));
    }

    #[test]
    fn test_same_seed_same_session() {
        let (a, _) = SessionGenerator::new(99).generate(SessionScenario::ShortTarget);
        let (b, _) = SessionGenerator::new(99).generate(SessionScenario::ShortTarget);
        assert_eq!(a, b);
    }
}
