use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::Broker;
use crate::config::BotConfig;
use crate::error::OrbError;
use crate::models::Candle;
use crate::snapshot::{BrokerSnapshot, RawSnapshot};
use crate::strategy::{Action, Decision, DecisionEngine};

/// What the executor did with a cycle's decision
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Placed { order_id: i64, legs: usize },
    Cancelled { order_id: i64 },
    /// Transient: retried on a later cycle
    Deferred(String),
    Nothing,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub decision: Decision,
    pub outcome: DispatchOutcome,
    pub candles: usize,
    pub latest_candle: Option<NaiveDateTime>,
}

/// Broker-facing settings for one executor
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub client_id: i32,
    pub lookback: String,
    pub candle_interval_minutes: u32,
    /// Feed timestamps are UTC and converted into this zone when set
    pub candle_timezone: Option<Tz>,
    pub order_id_poll_attempts: u32,
    pub order_id_poll_interval: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &BotConfig) -> Result<Self, OrbError> {
        let candle_timezone = config
            .candle_timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| OrbError::InvalidTimezone(name.to_string()))
            })
            .transpose()?;

        Ok(Self {
            client_id: config.client_id,
            lookback: config.lookback.clone(),
            candle_interval_minutes: config.candle_interval_minutes,
            candle_timezone,
            order_id_poll_attempts: config.order_id_poll_attempts,
            order_id_poll_interval: Duration::from_millis(config.order_id_poll_interval_ms),
        })
    }
}

/// Runs decision cycles against a broker
pub struct Executor<B: Broker> {
    broker: Arc<B>,
    engine: DecisionEngine,
    settings: ExecutorSettings,
    quantity: u32,
}

impl<B: Broker> Executor<B> {
    pub fn new(broker: Arc<B>, engine: DecisionEngine, settings: ExecutorSettings, quantity: u32) -> Self {
        Self {
            broker,
            engine,
            settings,
            quantity,
        }
    }

    pub fn broker(&self) -> Arc<B> {
        self.broker.clone()
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Snapshot, decide, dispatch
    pub async fn run_cycle(&mut self) -> anyhow::Result<CycleReport> {
        let snapshot = self.fetch_snapshot().await?;
        let candles = self.fetch_candles().await?;

        if let Some(last) = candles.last() {
            tracing::debug!(
                "Latest candle {}: O {:.2} H {:.2} L {:.2} C {:.2}",
                last.timestamp,
                last.open,
                last.high,
                last.low,
                last.close
            );
        }

        let decision = self.engine.evaluate(&snapshot, &candles, self.quantity);
        tracing::info!("  Decision: {:?} - {}", decision.state, decision.reason);

        let outcome = self.dispatch(&decision).await?;

        Ok(CycleReport {
            decision,
            outcome,
            candles: candles.len(),
            latest_candle: candles.last().map(|c| c.timestamp),
        })
    }

    async fn fetch_snapshot(&self) -> anyhow::Result<BrokerSnapshot> {
        // Unfiltered, like the broker's empty execution filter; the
        // normalizer keeps only our client id
        let raw = RawSnapshot {
            positions: self.broker.positions().await?,
            open_orders: self.broker.open_orders().await?,
            executions: self.broker.executions(None).await?,
        };

        let snapshot = BrokerSnapshot::normalize(raw, self.settings.client_id);

        if snapshot.positions().is_empty() {
            tracing::info!("  No positions have been opened yet today");
        } else {
            tracing::info!("  Positions: {:?}", snapshot.positions());
        }
        if snapshot.open_orders().is_empty() {
            tracing::info!("  Currently no open orders for algorithm");
        } else {
            tracing::info!("  Open orders: {}", snapshot.open_orders().len());
        }
        match snapshot.fill_prices().as_slice() {
            [] => tracing::info!("  No trades executed yet"),
            [entry] => tracing::info!("  In an open position from ${:.2}", entry),
            fills => tracing::info!("  Executed fills: {:?}", fills),
        }

        Ok(snapshot)
    }

    async fn fetch_candles(&self) -> anyhow::Result<Vec<Candle>> {
        let mut candles = self
            .broker
            .candles(
                self.engine.symbol(),
                &self.settings.lookback,
                self.settings.candle_interval_minutes,
            )
            .await?;

        if candles.is_empty() {
            tracing::warn!("  Candle feed returned no data yet, will retry next cycle");
        }

        // Zone rules per timestamp, so DST switches move the offset
        if let Some(tz) = self.settings.candle_timezone {
            for candle in &mut candles {
                candle.timestamp = Utc
                    .from_utc_datetime(&candle.timestamp)
                    .with_timezone(&tz)
                    .naive_local();
            }
        }
        Ok(candles)
    }

    async fn dispatch(&self, decision: &Decision) -> anyhow::Result<DispatchOutcome> {
        match &decision.action {
            Action::PlaceInitialBracket(plan) => {
                let Some(order_id) = self.acquire_order_id().await? else {
                    return Ok(self.deferred());
                };
                let oca_group = format!("ORB-{}", Uuid::new_v4());
                let legs = plan.oca_legs(order_id, &oca_group);
                let count = legs.len();

                self.broker.place_bracket_group(order_id, legs).await?;
                tracing::info!(
                    "✓ Placed OCA brackets {} (ids {}..{}): long {:.2}/{:.2}/{:.2}, short {:.2}/{:.2}/{:.2}",
                    oca_group,
                    order_id,
                    order_id + count as i64 - 1,
                    plan.long_entry,
                    plan.long_target,
                    plan.long_stop,
                    plan.short_entry,
                    plan.short_target,
                    plan.short_stop
                );
                Ok(DispatchOutcome::Placed {
                    order_id,
                    legs: count,
                })
            }

            Action::PlaceReentryBracket(bracket) => {
                let Some(order_id) = self.acquire_order_id().await? else {
                    return Ok(self.deferred());
                };
                let legs = bracket.legs(order_id);
                let count = legs.len();

                self.broker.place_bracket_group(order_id, legs).await?;
                tracing::info!(
                    "✓ Placed {:?} re-entry bracket {}: entry {:.2}, target {:.2}, stop {:.2}",
                    bracket.side,
                    order_id,
                    bracket.entry,
                    bracket.target,
                    bracket.stop
                );
                Ok(DispatchOutcome::Placed {
                    order_id,
                    legs: count,
                })
            }

            Action::CancelOrder { order_id } => {
                self.broker.cancel_order(*order_id).await?;
                tracing::info!("✓ Cancelled stale order {}", order_id);
                Ok(DispatchOutcome::Cancelled {
                    order_id: *order_id,
                })
            }

            Action::NoOp(_) => Ok(DispatchOutcome::Nothing),
        }
    }

    /// Poll the broker for an order id
    ///
    /// `Ok(None)` when the sequencer is still not ready after the configured
    /// attempts; the action is retried next cycle.
    async fn acquire_order_id(&self) -> anyhow::Result<Option<i64>> {
        let attempts = self.settings.order_id_poll_attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(order_id) = self.broker.next_order_id().await? {
                tracing::debug!("Using order id {}", order_id);
                return Ok(Some(order_id));
            }
            tracing::info!("Waiting for next valid order id ({}/{})", attempt, attempts);
            if attempt < attempts {
                tokio::time::sleep(self.settings.order_id_poll_interval).await;
            }
        }

        tracing::warn!("{}", OrbError::OrderIdUnavailable { attempts });
        Ok(None)
    }

    fn deferred(&self) -> DispatchOutcome {
        DispatchOutcome::Deferred(
            OrbError::OrderIdUnavailable {
                attempts: self.settings.order_id_poll_attempts.max(1),
            }
            .to_string(),
        )
    }
}
