use crate::backtest::metrics::SessionMetrics;
use crate::execution::{Broker, DispatchOutcome, Executor, ExecutorSettings, PaperBroker, PaperFill};
use crate::models::Candle;
use crate::strategy::{Action, DecisionEngine, OrbConfig, TradeAttemptState};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;

/// MNQ: two dollars per index point
pub const MNQ_POINT_VALUE: f64 = 2.0;

/// An action the executor actually sent to the broker
#[derive(Debug, Clone)]
pub struct ReplayAction {
    pub time: Option<NaiveDateTime>,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub bars: usize,
    pub cycles: usize,
    pub actions: Vec<ReplayAction>,
    pub fills: Vec<PaperFill>,
    pub open_orders: usize,
    pub final_state: TradeAttemptState,
    pub metrics: SessionMetrics,
}

impl ReplayReport {
    pub fn initial_placements(&self) -> usize {
        self.count(|a| matches!(a, Action::PlaceInitialBracket(_)))
    }

    pub fn reentries(&self) -> usize {
        self.count(|a| matches!(a, Action::PlaceReentryBracket(_)))
    }

    pub fn cancels(&self) -> usize {
        self.count(|a| matches!(a, Action::CancelOrder { .. }))
    }

    fn count(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(&a.action)).count()
    }
}

/// Replays a session bar by bar through the paper broker
///
/// Each bar is released (filling any resting orders it trades through) and
/// then `cycles_per_bar` executor cycles run against it, so decisions see
/// fills from the bar they happened on.
pub struct SessionReplay {
    config: OrbConfig,
    symbol: String,
    client_id: i32,
    quantity: u32,
    cycles_per_bar: usize,
    point_value: f64,
}

impl SessionReplay {
    pub fn new(config: OrbConfig, symbol: impl Into<String>, quantity: u32) -> Self {
        Self {
            config,
            symbol: symbol.into(),
            client_id: 1,
            quantity,
            cycles_per_bar: 2,
            point_value: MNQ_POINT_VALUE,
        }
    }

    pub fn with_client_id(mut self, client_id: i32) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_cycles_per_bar(mut self, cycles: usize) -> Self {
        self.cycles_per_bar = cycles.max(1);
        self
    }

    pub fn with_point_value(mut self, point_value: f64) -> Self {
        self.point_value = point_value;
        self
    }

    /// Run the whole session and report what was sent and filled
    pub async fn run(&self, candles: Vec<Candle>) -> anyhow::Result<ReplayReport> {
        if candles.is_empty() {
            anyhow::bail!("No candles to replay");
        }

        let bars = candles.len();
        tracing::info!(
            "Starting replay: {} bars, {} contract(s) of {}",
            bars,
            self.quantity,
            self.symbol
        );

        let broker = Arc::new(PaperBroker::new(self.symbol.clone(), self.client_id).with_feed(candles));
        let settings = ExecutorSettings {
            client_id: self.client_id,
            lookback: "1 D".to_string(),
            candle_interval_minutes: 5,
            candle_timezone: None,
            order_id_poll_attempts: 1,
            order_id_poll_interval: Duration::ZERO,
        };
        let mut executor = Executor::new(
            broker.clone(),
            DecisionEngine::new(self.config.clone(), self.symbol.clone()),
            settings,
            self.quantity,
        );

        let mut actions = Vec::new();
        let mut cycles = 0;
        let mut final_state = TradeAttemptState::NoAttempt;

        while broker.advance()?.is_some() {
            for _ in 0..self.cycles_per_bar {
                let report = executor.run_cycle().await?;
                cycles += 1;
                final_state = report.decision.state;

                match report.outcome {
                    DispatchOutcome::Placed { .. } | DispatchOutcome::Cancelled { .. } => {
                        actions.push(ReplayAction {
                            time: report.latest_candle,
                            action: report.decision.action,
                        });
                    }
                    DispatchOutcome::Deferred(reason) => {
                        tracing::warn!("Deferred: {}", reason);
                    }
                    DispatchOutcome::Nothing => {}
                }
            }
        }

        let fills = broker.fills()?;
        let open_orders = broker.open_orders().await?.len();
        let metrics = SessionMetrics::from_fills(&fills, self.point_value);

        tracing::info!(
            "Replay complete: {} actions, {} fills, P&L: ${:.2}",
            actions.len(),
            fills.len(),
            metrics.total_pnl
        );

        Ok(ReplayReport {
            bars,
            cycles,
            actions,
            fills,
            open_orders,
            final_state,
            metrics,
        })
    }
}
