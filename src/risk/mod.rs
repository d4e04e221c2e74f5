// Risk management module
pub mod sizing;

pub use sizing::{load_performance, AccountKind, ContractSizer, PerformanceRecord};
