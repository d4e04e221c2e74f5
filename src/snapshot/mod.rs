// Broker snapshot normalization
pub mod parser;

pub use parser::{parse_execution_details, ExecutionParseError, ParsedExecution};

use crate::error::OrbError;
use crate::models::{
    ExecutionRecord, OpenOrderSnapshot, PositionSnapshot, RawExecution,
};

/// Broker state exactly as retrieved in one cycle, duplicates included
#[derive(Debug, Clone, Default)]
pub struct RawSnapshot {
    pub positions: Vec<PositionSnapshot>,
    pub open_orders: Vec<OpenOrderSnapshot>,
    pub executions: Vec<RawExecution>,
}

/// De-duplicated broker state for one decision cycle
///
/// Built fresh every cycle and never mutated afterwards. Executions are
/// already filtered to this algorithm's client id and kept in fill order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerSnapshot {
    positions: Vec<PositionSnapshot>,
    open_orders: Vec<OpenOrderSnapshot>,
    executions: Vec<ExecutionRecord>,
}

impl BrokerSnapshot {
    /// Assemble a snapshot from already-normalized parts
    pub fn new(
        positions: Vec<PositionSnapshot>,
        open_orders: Vec<OpenOrderSnapshot>,
        executions: Vec<ExecutionRecord>,
    ) -> Self {
        Self {
            positions,
            open_orders,
            executions,
        }
    }

    /// Normalize a raw snapshot for the given client id
    ///
    /// Executions whose details cannot be parsed are dropped and logged;
    /// the rest of the cycle proceeds with the remaining records.
    pub fn normalize(raw: RawSnapshot, client_id: i32) -> Self {
        let positions = dedup_preserving_order(raw.positions);
        let open_orders = dedup_preserving_order(raw.open_orders);

        let executions = dedup_preserving_order(raw.executions)
            .into_iter()
            .filter_map(|raw| match parse_execution_details(&raw.details) {
                Ok(parsed) => Some(ExecutionRecord {
                    client_id: parsed.client_id,
                    avg_price: parsed.avg_price,
                    details: raw.details,
                }),
                Err(e) => {
                    tracing::warn!("Dropping execution record: {} ({})", e, raw.details);
                    None
                }
            })
            .filter(|record| record.client_id == client_id)
            .collect();

        Self {
            positions,
            open_orders,
            executions,
        }
    }

    pub fn positions(&self) -> &[PositionSnapshot] {
        &self.positions
    }

    pub fn open_orders(&self) -> &[OpenOrderSnapshot] {
        &self.open_orders
    }

    pub fn executions(&self) -> &[ExecutionRecord] {
        &self.executions
    }

    /// Fill prices in fill order
    pub fn fill_prices(&self) -> Vec<f64> {
        self.executions.iter().map(|e| e.avg_price).collect()
    }

    /// Signed position size for a symbol
    ///
    /// `Ok(None)` when the broker reports no row for the symbol. More than one
    /// row for the same symbol violates the one-row-per-symbol invariant.
    pub fn position_for(&self, symbol: &str) -> Result<Option<f64>, OrbError> {
        let rows: Vec<&PositionSnapshot> = self
            .positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .collect();

        match rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(row.position)),
            _ => Err(OrbError::DuplicatePosition {
                symbol: symbol.to_string(),
                rows: rows.len(),
            }),
        }
    }

    /// Resting orders for a symbol, in broker order
    pub fn orders_for<'a>(
        &'a self,
        symbol: &'a str,
    ) -> impl Iterator<Item = &'a OpenOrderSnapshot> + 'a {
        self.open_orders.iter().filter(move |o| o.symbol == symbol)
    }
}

/// Drop repeated items, keeping the first occurrence of each
fn dedup_preserving_order<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}
