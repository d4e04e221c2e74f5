// Broker seam, paper broker and the polling loop
pub mod broker;
pub mod executor;
pub mod paper;
pub mod scheduler;

pub use broker::Broker;
pub use executor::{CycleReport, DispatchOutcome, Executor, ExecutorSettings};
pub use paper::{PaperBroker, PaperFill};
pub use scheduler::{RunSummary, Scheduler, TradingWindow};
