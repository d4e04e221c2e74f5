use chrono::{Local, NaiveTime};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

use super::{Broker, DispatchOutcome, Executor};
use crate::config::ScheduleConfig;
use crate::strategy::Action;

const FINE_WAIT: Duration = Duration::from_secs(60);
const COARSE_WAIT: Duration = Duration::from_secs(15 * 60);

/// Trading-hours gate with a finer re-check close to the session
#[derive(Debug, Clone)]
pub struct TradingWindow {
    start: NaiveTime,
    end: NaiveTime,
    warmup_start: NaiveTime,
    warmup_end: NaiveTime,
}

impl TradingWindow {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            start: config.trading_start,
            end: config.trading_end,
            warmup_start: config.warmup_start,
            warmup_end: config.warmup_end,
        }
    }

    pub fn is_trading(&self, now: NaiveTime) -> bool {
        now >= self.start && now < self.end
    }

    /// How long to sleep before checking again, `None` once trading
    pub fn wait_before_trading(&self, now: NaiveTime) -> Option<Duration> {
        if self.is_trading(now) {
            None
        } else if now >= self.warmup_start && now < self.warmup_end {
            Some(FINE_WAIT)
        } else {
            Some(COARSE_WAIT)
        }
    }
}

/// Totals for one scheduler run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cycles: u64,
    pub errors: u64,
    pub actions: Vec<Action>,
}

/// Drives executor cycles at a fixed cadence for the configured lifetime
pub struct Scheduler {
    config: ScheduleConfig,
    window: TradingWindow,
    gate_trading_hours: bool,
}

impl Scheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        let window = TradingWindow::new(&config);
        Self {
            config,
            window,
            gate_trading_hours: true,
        }
    }

    /// Skip the wall-clock trading-hours gate (simulated sessions)
    pub fn without_trading_hours_gate(mut self) -> Self {
        self.gate_trading_hours = false;
        self
    }

    /// Sleep until the local clock is inside trading hours
    pub async fn wait_for_trading_hours(&self) {
        while let Some(wait) = self.window.wait_before_trading(Local::now().time()) {
            tracing::info!(
                "Outside trading hours, checking again in {} min (now {})",
                wait.as_secs() / 60,
                Local::now().format("%H:%M:%S")
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Run cycles until the lifetime elapses, the cycle limit is hit or
    /// Ctrl+C arrives
    pub async fn run<B: Broker>(&self, executor: &mut Executor<B>) -> anyhow::Result<RunSummary> {
        if self.gate_trading_hours {
            tokio::select! {
                _ = self.wait_for_trading_hours() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("⚠️  Received Ctrl+C before trading hours, stopping");
                    return Ok(RunSummary::default());
                }
            }
        }

        let lifetime = Duration::from_secs_f64(self.config.run_hours.max(0.0) * 3600.0);
        let deadline = Instant::now() + lifetime;
        let mut ticker = interval(Duration::from_secs(self.config.cadence_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = RunSummary::default();
        tracing::info!(
            "💹 Running every {}s for {:.1}h",
            self.config.cadence_secs,
            self.config.run_hours
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                    break;
                }
            }

            if Instant::now() >= deadline {
                tracing::info!("Run duration reached, taking algorithm offline");
                break;
            }

            summary.cycles += 1;
            match executor.run_cycle().await {
                Ok(report) => {
                    if !matches!(report.outcome, DispatchOutcome::Nothing | DispatchOutcome::Deferred(_)) {
                        summary.actions.push(report.decision.action);
                    }
                }
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!("  ✗ Cycle {} failed: {:#}", summary.cycles, e);
                }
            }
            tracing::info!("Algorithm completed round {}", summary.cycles);

            if self.config.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
        }

        Ok(summary)
    }
}
