pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use metrics::{SessionMetrics, TradeRecord};
pub use runner::{ReplayAction, ReplayReport, SessionReplay, MNQ_POINT_VALUE};
pub use synthetic::{RangeLevels, SessionGenerator, SessionScenario};
