// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use crate::domain::models::{RiskRules, RiskTolerance};
use dotenv::dotenv;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Decision engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Evaluation pipeline configuration
    pub engine: EngineConfig,

    /// Risk configuration applied to every evaluation
    pub risk: RiskConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Evaluation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-analyzer timeout in seconds
    pub analyzer_timeout_secs: u64,

    /// Attach prose rationale to decisions when a generator is wired in
    pub narrate_decisions: bool,
}

/// Risk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Caller-level risk appetite
    pub tolerance: RiskTolerance,

    /// Hard cap on units per decision, if set
    pub max_quantity: Option<f64>,

    /// Default lower bound of risk per trade, percent of balance
    pub min_risk_percent: f64,

    /// Default upper bound of risk per trade, percent of balance
    pub max_risk_percent: f64,
}

impl RiskConfig {
    /// Default risk rules for strategy records that do not declare their own
    /// bounds
    pub fn risk_rules(&self) -> RiskRules {
        RiskRules {
            min_risk_percent: self.min_risk_percent,
            max_risk_percent: self.max_risk_percent.max(self.min_risk_percent),
            required_risk_reward: None,
            stop_method: None,
        }
    }

    /// Configured unit cap as the `TradingContext` quantity bound
    pub fn quantity_cap(&self) -> Option<Decimal> {
        self.max_quantity
            .filter(|q| *q > 0.0)
            .and_then(Decimal::from_f64)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let engine = EngineConfig {
            analyzer_timeout_secs: env::var("ANALYZER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            narrate_decisions: env::var("NARRATE_DECISIONS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        };

        let tolerance = match env::var("RISK_TOLERANCE")
            .unwrap_or_else(|_| "moderate".to_string())
            .to_lowercase()
            .as_str()
        {
            "conservative" => RiskTolerance::Conservative,
            "aggressive" => RiskTolerance::Aggressive,
            _ => RiskTolerance::Moderate,
        };

        let risk = RiskConfig {
            tolerance,
            max_quantity: env::var("MAX_QUANTITY").ok().and_then(|v| v.parse().ok()),
            min_risk_percent: env::var("MIN_RISK_PERCENT")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()
                .unwrap_or(0.5),
            max_risk_percent: env::var("MAX_RISK_PERCENT")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2.0),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        Ok(Config {
            engine,
            risk,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path)
            .map_err(|e| AppError::Config(format!("Failed to open config file: {}", e)))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path)
                    .map_err(|e| AppError::Config(format!("Failed to create log file: {}", e)))?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.init();

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                analyzer_timeout_secs: 5,
                narrate_decisions: false,
            },
            risk: RiskConfig {
                tolerance: RiskTolerance::Moderate,
                max_quantity: None,
                min_risk_percent: 0.5,
                max_risk_percent: 2.0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.engine.analyzer_timeout_secs, 5);
        assert_eq!(parsed.risk.tolerance, RiskTolerance::Moderate);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn risk_config_maps_into_domain_bounds() {
        let mut config = Config::default();
        config.risk.max_quantity = Some(2.5);
        config.risk.min_risk_percent = 1.0;
        config.risk.max_risk_percent = 0.4;

        let rules = config.risk.risk_rules();
        assert!((rules.min_risk_percent - 1.0).abs() < 1e-9);
        // An inverted bound collapses onto the minimum instead of going negative
        assert!((rules.max_risk_percent - 1.0).abs() < 1e-9);
        assert_eq!(config.risk.quantity_cap(), Decimal::from_f64(2.5));

        config.risk.max_quantity = Some(-1.0);
        assert_eq!(config.risk.quantity_cap(), None);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::from_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
