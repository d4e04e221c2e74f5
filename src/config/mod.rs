use chrono::NaiveTime;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::OrbError;
use crate::risk::{AccountKind, ContractSizer};
use crate::strategy::OrbConfig;

/// Polling cadence and trading-hours gate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub cadence_secs: u64,
    pub run_hours: f64,
    pub trading_start: NaiveTime, // Skips the first minutes of heavy volume
    pub trading_end: NaiveTime,
    pub warmup_start: NaiveTime, // Outside this window, check every 15 min
    pub warmup_end: NaiveTime,
    pub max_cycles: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cadence_secs: 3,
            run_hours: 6.5,
            trading_start: hm(7, 33),
            trading_end: hm(14, 0),
            warmup_start: hm(7, 15),
            warmup_end: hm(14, 15),
            max_cycles: None,
        }
    }
}

/// Top-level bot configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub client_id: i32,
    pub account: AccountKind,
    pub symbol: String,
    pub expiration: String, // Contract month, YYYYMM; roll quarterly
    pub lookback: String,
    pub candle_interval_minutes: u32,
    pub candle_timezone: Option<String>, // IANA zone, e.g. "America/Denver"; unset means the feed is local
    pub order_id_poll_attempts: u32,
    pub order_id_poll_interval_ms: u64,
    pub performance_file: Option<String>,
    pub strategy: OrbConfig,
    pub schedule: ScheduleConfig,
    pub sizing: ContractSizer,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            client_id: 1,
            account: AccountKind::Sim,
            symbol: "MNQ".to_string(),
            expiration: "202503".to_string(),
            lookback: "1 D".to_string(),
            candle_interval_minutes: 5,
            candle_timezone: None,
            order_id_poll_attempts: 5,
            order_id_poll_interval_ms: 1000,
            performance_file: None,
            strategy: OrbConfig::default(),
            schedule: ScheduleConfig::default(),
            sizing: ContractSizer::default(),
        }
    }
}

impl BotConfig {
    /// Load from an optional file, overridden by `ORB_*` environment variables
    ///
    /// Nested keys use a double underscore, e.g.
    /// `ORB_STRATEGY__PRICE_TOLERANCE=4.0`.
    pub fn load(path: Option<&Path>) -> Result<Self, OrbError> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("ORB")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, OrbError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder.add_source(env).build()?;
        Ok(settings.try_deserialize()?)
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::environment().source(Some(map))
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = BotConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.strategy.anchor_time, hm(7, 35));
        assert_eq!(config.schedule.cadence_secs, 3);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
client_id = 7
account = "live"
expiration = "202506"

[strategy]
price_tolerance = 4.0
anchor_time = "07:40:00"

[sizing]
profit_step = 2500.0
"#
        )
        .unwrap();

        let config = BotConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.client_id, 7);
        assert_eq!(config.account, AccountKind::Live);
        assert_eq!(config.expiration, "202506");
        assert_eq!(config.strategy.price_tolerance, 4.0);
        assert_eq!(config.strategy.anchor_time, hm(7, 40));
        assert_eq!(config.strategy.range_candle_time, hm(7, 30));
        assert_eq!(config.sizing.profit_step, 2500.0);
        assert_eq!(config.sizing.base_contracts, 1);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "client_id = 7\nsymbol = \"MES\"").unwrap();

        let config = BotConfig::load_with_env(
            Some(file.path()),
            env(&[("ORB_CLIENT_ID", "9"), ("ORB_SCHEDULE__CADENCE_SECS", "5")]),
        )
        .unwrap();

        assert_eq!(config.client_id, 9);
        assert_eq!(config.symbol, "MES");
        assert_eq!(config.schedule.cadence_secs, 5);
    }

    #[test]
    fn test_candle_timezone_from_env() {
        let config =
            BotConfig::load_with_env(None, env(&[("ORB_CANDLE_TIMEZONE", "America/Denver")])).unwrap();
        assert_eq!(config.candle_timezone.as_deref(), Some("America/Denver"));
        assert_eq!(BotConfig::default().candle_timezone, None);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = BotConfig::load_with_env(Some(Path::new("/nonexistent/orb.toml")), env(&[]));
        assert!(matches!(result, Err(OrbError::Config(_))));
    }
}
