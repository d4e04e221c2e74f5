use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::OrbError;

/// Which account a performance row was booked against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Sim,
    Live,
}

/// Realized performance of this algorithm for one period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceRecord {
    pub account: AccountKind,
    pub gross_profit: f64,
    pub commissions: f64,
}

impl PerformanceRecord {
    pub fn net_profit(&self) -> f64 {
        self.gross_profit - self.commissions
    }
}

/// Scales contract count with the algorithm's trailing net profit
///
/// One extra contract per full `profit_step` of net profit; losses scale
/// back down the same way, never below zero contracts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContractSizer {
    pub profit_step: f64,
    pub base_contracts: u32,
}

impl Default for ContractSizer {
    fn default() -> Self {
        Self {
            profit_step: 2000.0,
            base_contracts: 1,
        }
    }
}

impl ContractSizer {
    /// Net profit across the account's records
    pub fn net_profit(&self, records: &[PerformanceRecord], account: AccountKind) -> f64 {
        records
            .iter()
            .filter(|r| r.account == account)
            .map(PerformanceRecord::net_profit)
            .sum()
    }

    /// Contracts to trade today
    pub fn contracts_for(&self, records: &[PerformanceRecord], account: AccountKind) -> u32 {
        let has_history = records.iter().any(|r| r.account == account);
        if !has_history || self.profit_step <= 0.0 {
            return self.base_contracts;
        }

        let additional = (self.net_profit(records, account) / self.profit_step).floor() as i64;
        (self.base_contracts as i64 + additional).max(0) as u32
    }
}

/// Read performance rows from a JSON array file
pub fn load_performance(path: impl AsRef<Path>) -> Result<Vec<PerformanceRecord>, OrbError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| OrbError::Performance(format!("{}: {}", path.display(), e)))?;

    serde_json::from_str(&raw)
        .map_err(|e| OrbError::Performance(format!("{}: {}", path.display(), e)))
}
