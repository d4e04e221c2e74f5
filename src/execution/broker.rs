use async_trait::async_trait;

use crate::models::{Candle, OpenOrderSnapshot, OrderLeg, PositionSnapshot, RawExecution};

/// Broker collaborator consumed by the executor
///
/// Each read is a snapshot "as of roughly now"; nothing is guaranteed to be
/// consistent across calls.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn positions(&self) -> anyhow::Result<Vec<PositionSnapshot>>;

    async fn open_orders(&self) -> anyhow::Result<Vec<OpenOrderSnapshot>>;

    /// Executions for every client trading the account unless filtered
    async fn executions(&self, client_id: Option<i32>) -> anyhow::Result<Vec<RawExecution>>;

    /// Session candles, oldest first; may be empty while the feed catches up
    async fn candles(
        &self,
        symbol: &str,
        lookback: &str,
        interval_minutes: u32,
    ) -> anyhow::Result<Vec<Candle>>;

    async fn place_bracket_group(&self, order_id: i64, legs: Vec<OrderLeg>) -> anyhow::Result<()>;

    async fn cancel_order(&self, order_id: i64) -> anyhow::Result<()>;

    /// Next usable order id, `None` until the id sequencer is ready
    async fn next_order_id(&self) -> anyhow::Result<Option<i64>>;
}
