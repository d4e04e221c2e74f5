use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use super::Broker;
use crate::models::{
    Candle, OpenOrderSnapshot, OrderAction, OrderKind, OrderLeg, OrderRole, PositionSnapshot,
    RawExecution,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum LegStatus {
    Working,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone)]
struct PaperOrder {
    leg: OrderLeg,
    perm_id: i64,
    status: LegStatus,
    active: bool, // Children activate once their parent fills
}

/// A simulated fill
#[derive(Debug, Clone, PartialEq)]
pub struct PaperFill {
    pub order_id: i64,
    pub role: OrderRole,
    pub action: OrderAction,
    pub quantity: u32,
    pub price: f64,
    pub time: NaiveDateTime,
}

#[derive(Debug)]
struct PaperState {
    candles: Vec<Candle>,
    pending: VecDeque<Candle>,
    orders: Vec<PaperOrder>,
    position: Option<f64>,
    executions: Vec<(i32, RawExecution)>,
    fills: Vec<PaperFill>,
    next_order_id: i64,
    next_perm_id: i64,
    order_ids_ready: bool,
}

/// In-memory broker that fills brackets against released candles
///
/// Entry stop-limits fill at their stop level when a bar trades through it.
/// Exits are checked from the bar after the entry fills; when a bar touches
/// both target and stop, the stop is assumed to fill first. The position row
/// stays (at zero) once the symbol has traded, as the live broker reports it.
#[derive(Clone)]
pub struct PaperBroker {
    symbol: String,
    client_id: i32,
    auto_advance: bool,
    state: Arc<RwLock<PaperState>>,
}

impl PaperBroker {
    /// Create a broker that attributes its fills to `client_id`
    pub fn new(symbol: impl Into<String>, client_id: i32) -> Self {
        Self {
            symbol: symbol.into(),
            client_id,
            auto_advance: false,
            state: Arc::new(RwLock::new(PaperState {
                candles: Vec::new(),
                pending: VecDeque::new(),
                orders: Vec::new(),
                position: None,
                executions: Vec::new(),
                fills: Vec::new(),
                next_order_id: 1,
                next_perm_id: 1_684_398_000,
                order_ids_ready: true,
            })),
        }
    }

    /// Queue candles to be released one at a time
    pub fn with_feed(self, candles: Vec<Candle>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.pending.extend(candles);
        }
        self
    }

    /// Release the next queued candle on every candle poll
    pub fn with_auto_advance(mut self) -> Self {
        self.auto_advance = true;
        self
    }

    pub fn set_order_ids_ready(&self, ready: bool) -> anyhow::Result<()> {
        self.write()?.order_ids_ready = ready;
        Ok(())
    }

    /// Release the next queued candle and simulate fills on it
    pub fn advance(&self) -> anyhow::Result<Option<Candle>> {
        let mut state = self.write()?;
        let Some(candle) = state.pending.pop_front() else {
            return Ok(None);
        };
        state.release(candle.clone(), &self.symbol, self.client_id);
        Ok(Some(candle))
    }

    /// Release a candle directly, bypassing the queue
    pub fn push_candle(&self, candle: Candle) -> anyhow::Result<()> {
        self.write()?.release(candle, &self.symbol, self.client_id);
        Ok(())
    }

    pub fn pending_candles(&self) -> anyhow::Result<usize> {
        Ok(self.read()?.pending.len())
    }

    /// Record an execution belonging to some other client on the account
    pub fn record_foreign_execution(&self, client_id: i32, details: impl Into<String>) -> anyhow::Result<()> {
        self.write()?.executions.push((
            client_id,
            RawExecution {
                details: details.into(),
            },
        ));
        Ok(())
    }

    pub fn fills(&self) -> anyhow::Result<Vec<PaperFill>> {
        Ok(self.read()?.fills.clone())
    }

    pub fn position(&self) -> anyhow::Result<f64> {
        Ok(self.read()?.position.unwrap_or(0.0))
    }

    /// Price points realized over closed round trips, times quantity
    pub fn realized_points(&self) -> anyhow::Result<f64> {
        let state = self.read()?;
        let mut cash = 0.0;
        let mut position = 0.0;
        let mut realized = 0.0;

        for fill in &state.fills {
            let qty = fill.quantity as f64;
            match fill.action {
                OrderAction::Buy => {
                    cash -= fill.price * qty;
                    position += qty;
                }
                OrderAction::Sell => {
                    cash += fill.price * qty;
                    position -= qty;
                }
            }
            if position == 0.0 {
                realized += cash;
                cash = 0.0;
            }
        }
        Ok(realized)
    }

    fn read(&self) -> anyhow::Result<std::sync::RwLockReadGuard<'_, PaperState>> {
        self.state.read().map_err(|e| anyhow::anyhow!(e.to_string()))
    }

    fn write(&self) -> anyhow::Result<std::sync::RwLockWriteGuard<'_, PaperState>> {
        self.state.write().map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

impl PaperState {
    fn release(&mut self, candle: Candle, symbol: &str, client_id: i32) {
        // Exits armed before this bar; a fresh entry's children wait a bar
        let mut exit_candidates: Vec<usize> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.status == LegStatus::Working && o.active && o.leg.parent_id.is_some())
            .map(|(i, _)| i)
            .collect();
        exit_candidates.sort_by_key(|&i| match self.orders[i].leg.role {
            OrderRole::Stop => 0,
            _ => 1,
        });

        let entries: Vec<usize> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.status == LegStatus::Working && o.active && o.leg.parent_id.is_none())
            .map(|(i, _)| i)
            .collect();

        for idx in entries.into_iter().chain(exit_candidates) {
            if self.orders[idx].status != LegStatus::Working {
                continue; // Taken down by an earlier fill this bar
            }
            if let Some(price) = trigger_price(&self.orders[idx].leg, &candle) {
                self.fill(idx, price, candle.timestamp, symbol, client_id);
            }
        }

        self.candles.push(candle);
    }

    fn fill(&mut self, idx: usize, price: f64, time: NaiveDateTime, symbol: &str, client_id: i32) {
        self.orders[idx].status = LegStatus::Filled;
        let leg = self.orders[idx].leg.clone();
        let perm_id = self.orders[idx].perm_id;

        let signed = match leg.action {
            OrderAction::Buy => leg.quantity as f64,
            OrderAction::Sell => -(leg.quantity as f64),
        };
        self.position = Some(self.position.unwrap_or(0.0) + signed);

        let side = match leg.action {
            OrderAction::Buy => "BOT",
            OrderAction::Sell => "SLD",
        };
        let details = format!(
            "ExecId: 0000e0d5.{:08x}.01.01, Time: {}, Account: PAPER, Symbol: {}, Side: {}, \
             Shares: {}, Price: {:.2}, PermId: {}, ClientId: {}, OrderId: {}, CumQty: {}, AvgPrice: {:.2}",
            self.fills.len() + 1,
            time.format("%Y%m%d %H:%M:%S"),
            symbol,
            side,
            leg.quantity,
            price,
            perm_id,
            client_id,
            leg.order_id,
            leg.quantity,
            price
        );
        self.executions.push((client_id, RawExecution { details }));
        self.fills.push(PaperFill {
            order_id: leg.order_id,
            role: leg.role,
            action: leg.action,
            quantity: leg.quantity,
            price,
            time,
        });

        tracing::debug!("Paper fill: {:?} {} @ {:.2} ({:?})", leg.action, leg.quantity, price, leg.role);

        match leg.parent_id {
            None => {
                for child in self.orders.iter_mut().filter(|o| o.leg.parent_id == Some(leg.order_id)) {
                    child.active = true;
                }
                if let Some(group) = &leg.oca_group {
                    let siblings: Vec<i64> = self
                        .orders
                        .iter()
                        .filter(|o| o.leg.order_id != leg.order_id && o.leg.oca_group.as_ref() == Some(group))
                        .map(|o| o.leg.order_id)
                        .collect();
                    for id in siblings {
                        self.cancel(id);
                    }
                }
            }
            Some(parent) => {
                // Target and stop of one bracket cancel each other
                let siblings: Vec<i64> = self
                    .orders
                    .iter()
                    .filter(|o| o.leg.parent_id == Some(parent) && o.leg.order_id != leg.order_id)
                    .map(|o| o.leg.order_id)
                    .collect();
                for id in siblings {
                    self.cancel(id);
                }
            }
        }
    }

    /// Cancel a working order with its children and OCA group
    fn cancel(&mut self, order_id: i64) -> bool {
        let mut queue = vec![order_id];
        let mut cancelled_any = false;

        while let Some(id) = queue.pop() {
            let Some(order) = self
                .orders
                .iter_mut()
                .find(|o| o.leg.order_id == id && o.status == LegStatus::Working)
            else {
                continue;
            };
            order.status = LegStatus::Cancelled;
            cancelled_any = true;
            let group = order.leg.oca_group.clone();

            for other in &self.orders {
                if other.status != LegStatus::Working {
                    continue;
                }
                let is_child = other.leg.parent_id == Some(id);
                let same_group = group.is_some() && other.leg.oca_group == group;
                if is_child || same_group {
                    queue.push(other.leg.order_id);
                }
            }
        }
        cancelled_any
    }
}

/// Price at which a leg fills on this bar, if it trades
fn trigger_price(leg: &OrderLeg, bar: &Candle) -> Option<f64> {
    let hit = |level: f64, buy_when_high: bool| {
        if buy_when_high {
            bar.high >= level
        } else {
            bar.low <= level
        }
    };

    let (level, triggered) = match (&leg.kind, leg.action) {
        (OrderKind::StopLimit { stop, .. }, OrderAction::Buy) => (*stop, hit(*stop, true)),
        (OrderKind::StopLimit { stop, .. }, OrderAction::Sell) => (*stop, hit(*stop, false)),
        (OrderKind::Stop { price }, OrderAction::Buy) => (*price, hit(*price, true)),
        (OrderKind::Stop { price }, OrderAction::Sell) => (*price, hit(*price, false)),
        (OrderKind::Limit { price }, OrderAction::Buy) => (*price, hit(*price, false)),
        (OrderKind::Limit { price }, OrderAction::Sell) => (*price, hit(*price, true)),
    };

    triggered.then_some(level)
}

#[async_trait]
impl Broker for PaperBroker {
    async fn positions(&self) -> anyhow::Result<Vec<PositionSnapshot>> {
        let state = self.read()?;
        Ok(state
            .position
            .map(|position| PositionSnapshot {
                symbol: self.symbol.clone(),
                position,
            })
            .into_iter()
            .collect())
    }

    async fn open_orders(&self) -> anyhow::Result<Vec<OpenOrderSnapshot>> {
        let state = self.read()?;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.status == LegStatus::Working)
            .map(|o| OpenOrderSnapshot {
                order_id: o.leg.order_id,
                symbol: self.symbol.clone(),
                role: o.leg.role,
                perm_id: o.perm_id,
            })
            .collect())
    }

    async fn executions(&self, client_id: Option<i32>) -> anyhow::Result<Vec<RawExecution>> {
        let state = self.read()?;
        Ok(state
            .executions
            .iter()
            .filter(|(owner, _)| client_id.map_or(true, |c| c == *owner))
            .map(|(_, raw)| raw.clone())
            .collect())
    }

    async fn candles(
        &self,
        _symbol: &str,
        _lookback: &str,
        _interval_minutes: u32,
    ) -> anyhow::Result<Vec<Candle>> {
        if self.auto_advance {
            self.advance()?;
        }
        Ok(self.read()?.candles.clone())
    }

    async fn place_bracket_group(&self, order_id: i64, legs: Vec<OrderLeg>) -> anyhow::Result<()> {
        let mut state = self.write()?;

        if legs.is_empty() {
            anyhow::bail!("Order group {} has no legs", order_id);
        }
        if let Some(dup) = legs
            .iter()
            .find(|leg| state.orders.iter().any(|o| o.leg.order_id == leg.order_id))
        {
            anyhow::bail!("Duplicate order id {}", dup.order_id);
        }

        let max_id = legs.iter().map(|l| l.order_id).max().unwrap_or(order_id);
        for leg in legs {
            let perm_id = state.next_perm_id;
            state.next_perm_id += 1;
            let active = leg.parent_id.is_none();
            state.orders.push(PaperOrder {
                leg,
                perm_id,
                status: LegStatus::Working,
                active,
            });
        }
        state.next_order_id = state.next_order_id.max(max_id + 1);
        Ok(())
    }

    async fn cancel_order(&self, order_id: i64) -> anyhow::Result<()> {
        let mut state = self.write()?;
        if !state.cancel(order_id) {
            anyhow::bail!("No working order {}", order_id);
        }
        Ok(())
    }

    async fn next_order_id(&self) -> anyhow::Result<Option<i64>> {
        let state = self.read()?;
        Ok(state.order_ids_ready.then_some(state.next_order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{BracketPlan, OpeningRange};
    use chrono::{NaiveDate, NaiveTime};

    fn bar(minute: u32, high: f64, low: f64) -> Candle {
        Candle {
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 3)
                .unwrap()
                .and_hms_opt(7, minute, 0)
                .unwrap(),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 900.0,
        }
    }

    fn plan() -> BracketPlan {
        let range = OpeningRange {
            high: 21005.0,
            low: 20995.0,
            candle_time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
        };
        BracketPlan::new(&range, 1, 2.0)
    }

    #[tokio::test]
    async fn test_breakout_fills_one_side_and_cancels_other() {
        let broker = PaperBroker::new("MNQ", 7);
        broker
            .place_bracket_group(1, plan().oca_legs(1, "oca-1"))
            .await
            .unwrap();
        assert_eq!(broker.open_orders().await.unwrap().len(), 6);

        broker.push_candle(bar(40, 21008.0, 21000.0)).unwrap();

        let open = broker.open_orders().await.unwrap();
        let ids: Vec<i64> = open.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(broker.position().unwrap(), 1.0);
        assert_eq!(broker.executions(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_exit_leaves_flat_position_row() {
        let broker = PaperBroker::new("MNQ", 7);
        broker
            .place_bracket_group(1, plan().oca_legs(1, "oca-1"))
            .await
            .unwrap();

        broker.push_candle(bar(40, 21008.0, 21000.0)).unwrap();
        broker.push_candle(bar(45, 21002.0, 20990.0)).unwrap();

        let positions = broker.positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].position, 0.0);
        assert!(broker.open_orders().await.unwrap().is_empty());

        let fills = broker.fills().unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[1].role, OrderRole::Stop);
        assert_eq!(fills[1].price, 20995.0);
        assert_eq!(broker.realized_points().unwrap(), -10.0);
    }

    #[tokio::test]
    async fn test_stop_wins_when_bar_touches_both() {
        let broker = PaperBroker::new("MNQ", 7);
        broker
            .place_bracket_group(1, plan().long().legs(1))
            .await
            .unwrap();

        broker.push_candle(bar(40, 21006.0, 21001.0)).unwrap();
        broker.push_candle(bar(45, 21030.0, 20990.0)).unwrap();

        let fills = broker.fills().unwrap();
        assert_eq!(fills[1].role, OrderRole::Stop);
    }

    #[tokio::test]
    async fn test_target_exit() {
        let broker = PaperBroker::new("MNQ", 7);
        broker
            .place_bracket_group(1, plan().short().legs(1))
            .await
            .unwrap();

        broker.push_candle(bar(40, 20998.0, 20990.0)).unwrap();
        broker.push_candle(bar(45, 20990.0, 20970.0)).unwrap();

        assert_eq!(broker.position().unwrap(), 0.0);
        assert_eq!(broker.realized_points().unwrap(), 20.0);
    }

    #[tokio::test]
    async fn test_cancel_parent_cascades() {
        let broker = PaperBroker::new("MNQ", 7);
        broker
            .place_bracket_group(10, plan().long().legs(10))
            .await
            .unwrap();

        broker.cancel_order(10).await.unwrap();
        assert!(broker.open_orders().await.unwrap().is_empty());
        assert!(broker.cancel_order(10).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_oca_entry_takes_group_down() {
        let broker = PaperBroker::new("MNQ", 7);
        broker
            .place_bracket_group(1, plan().oca_legs(1, "oca-1"))
            .await
            .unwrap();

        broker.cancel_order(1).await.unwrap();
        assert!(broker.open_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_order_ids_rejected() {
        let broker = PaperBroker::new("MNQ", 7);
        broker
            .place_bracket_group(1, plan().long().legs(1))
            .await
            .unwrap();

        assert!(broker
            .place_bracket_group(2, plan().short().legs(2))
            .await
            .is_err());
        assert_eq!(broker.next_order_id().await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_execution_filter() {
        let broker = PaperBroker::new("MNQ", 7);
        broker
            .record_foreign_execution(3, "ClientId: 3, AvgPrice: 100.0")
            .unwrap();
        broker
            .place_bracket_group(1, plan().long().legs(1))
            .await
            .unwrap();
        broker.push_candle(bar(40, 21010.0, 21001.0)).unwrap();

        assert_eq!(broker.executions(None).await.unwrap().len(), 2);
        let own = broker.executions(Some(7)).await.unwrap();
        assert_eq!(own.len(), 1);
        assert!(own[0].details.contains("AvgPrice: 21005.00"));
    }

    #[tokio::test]
    async fn test_order_ids_not_ready() {
        let broker = PaperBroker::new("MNQ", 7);
        broker.set_order_ids_ready(false).unwrap();
        assert_eq!(broker.next_order_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_auto_advance_releases_one_bar_per_poll() {
        let broker = PaperBroker::new("MNQ", 7)
            .with_feed(vec![bar(30, 21005.0, 20995.0), bar(35, 21010.0, 21000.0)])
            .with_auto_advance();

        assert_eq!(broker.candles("MNQ", "1 D", 5).await.unwrap().len(), 1);
        assert_eq!(broker.candles("MNQ", "1 D", 5).await.unwrap().len(), 2);
        assert_eq!(broker.candles("MNQ", "1 D", 5).await.unwrap().len(), 2);
        assert_eq!(broker.pending_candles().unwrap(), 0);
    }
}
