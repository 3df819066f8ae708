//! Configuration management for Skyweave agents.

use crate::error::{CoreError, CoreResult};
use crate::utility::UtilityFunction;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Planner settings
    pub planner: PlannerConfig,
    /// Simulation clock
    #[serde(default)]
    pub clock: ClockConfig,
    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which preplanner to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreplannerKind {
    /// Schedule every reachable subtask at its earliest feasible access
    EarliestAccess,
    /// No preplanning; the replanner builds the first plan
    #[default]
    None,
}

/// Which reactive replanner to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplannerKind {
    /// Consensus-based bundle allocation
    #[default]
    Consensus,
    /// Keep the preplanned schedule
    None,
}

/// Planner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum number of subtasks in a bundle
    pub max_bundle_size: usize,
    /// Planning horizon [s]
    #[serde(default = "default_horizon")]
    pub horizon: f64,
    /// Periodic preplanner
    #[serde(default)]
    pub preplanner: PreplannerKind,
    /// Preplanner period [s]; unset runs it once at start
    #[serde(default)]
    pub preplanner_period: Option<f64>,
    /// Reactive replanner
    #[serde(default)]
    pub replanner: ReplannerKind,
    /// Periodic replanning interval for the consensus replanner [s]
    #[serde(default)]
    pub replanner_period: Option<f64>,
    /// Utility function used to score observations
    #[serde(default)]
    pub utility: UtilityFunction,
}

fn default_horizon() -> f64 {
    f64::INFINITY
}

/// Simulation clock
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClockConfig {
    /// Time advances to the next event
    #[default]
    EventDriven,
    /// Time advances in fixed steps
    FixedStep {
        /// Step length [s]
        dt: f64,
    },
}

impl ClockConfig {
    /// Step length, if the clock is stepped
    pub fn step(&self) -> Option<f64> {
        match self {
            ClockConfig::EventDriven => None,
            ClockConfig::FixedStep { dt } => Some(*dt),
        }
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load and validate a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML configuration string
    pub fn from_toml(content: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> CoreResult<()> {
        if self.planner.max_bundle_size == 0 {
            return Err(CoreError::Config(
                "planner.max_bundle_size must be at least 1".to_string(),
            ));
        }
        if !(self.planner.horizon > 0.0) {
            return Err(CoreError::Config(format!(
                "planner.horizon must be positive, got {}",
                self.planner.horizon
            )));
        }
        for (name, period) in [
            ("planner.preplanner_period", self.planner.preplanner_period),
            ("planner.replanner_period", self.planner.replanner_period),
        ] {
            if let Some(period) = period {
                if !(period > 0.0) {
                    return Err(CoreError::Config(format!(
                        "{name} must be positive, got {period}"
                    )));
                }
            }
        }
        if let ClockConfig::FixedStep { dt } = self.clock {
            if !(dt > 0.0 && dt.is_finite()) {
                return Err(CoreError::Config(format!(
                    "clock.dt must be positive and finite, got {dt}"
                )));
            }
        }
        Ok(())
    }

    /// Defaults used when no configuration file is given
    pub fn default_config() -> Self {
        Self {
            planner: PlannerConfig {
                max_bundle_size: 3,
                horizon: f64::INFINITY,
                preplanner: PreplannerKind::None,
                preplanner_period: None,
                replanner: ReplannerKind::Consensus,
                replanner_period: None,
                utility: UtilityFunction::Fixed,
            },
            clock: ClockConfig::EventDriven,
            logging: LoggingConfig::default(),
        }
    }
}
