//! Skyweave Planner - per-agent planning loop
//!
//! Turns what an agent perceives into a time-ordered plan of maneuvers, observations
//! and broadcasts. A periodic preplanner and a reactive consensus replanner can be
//! combined; the async runtime drives one planning cycle per state update.
//!
//! # Core Components
//!
//! - **Planner**: interface shared by all planning strategies
//! - **Earliest Access Preplanner**: periodic schedule of every reachable subtask
//! - **Consensus Replanner**: bundle allocation by bid gossip
//! - **Planning Module**: preplanner, replanner, relays and request announcements
//! - **Agent Runtime**: listener and planner tasks connected by bounded channels
//!
//! # Example Usage
//!
//! ```rust
//! use skyweave_core::{Config, TabulatedOracle};
//! use skyweave_feasibility::{AdcsSpec, AgentSpecs, AgentState, InstrumentSpec, SatelliteState};
//! use skyweave_planner::{Percepts, PlanningModule};
//!
//! let specs = AgentSpecs {
//!     adcs: Some(AdcsSpec { max_rate: Some(1.0), max_torque: Some(1.0) }),
//!     instruments: vec![InstrumentSpec::rectangular("VNIR", 5.0, 10.0)],
//! };
//! let mut module = PlanningModule::new("sat-1", &Config::default_config(), &specs).unwrap();
//!
//! let state = AgentState::Satellite(SatelliteState {
//!     agent: "sat-1".to_string(),
//!     t: 0.0,
//!     pos: [7000.0, 0.0, 0.0],
//!     vel: [0.0, 7.5, 0.0],
//!     attitude: [0.0, 0.0, 0.0],
//!     attitude_rates: [0.0; 3],
//! });
//! let oracle = TabulatedOracle::new(1.0);
//!
//! let actions = module.step(&state, Percepts::default(), &oracle).unwrap();
//! assert!(actions.is_empty());
//! assert!(module.plan().is_initialized());
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod module;
pub mod planner;
pub mod preplanner;
pub mod replanner;
pub mod runtime;

pub use error::{PlannerError, PlannerResult};
pub use module::PlanningModule;
pub use planner::{pending_broadcasts, Percepts, Planner, PlanningContext};
pub use preplanner::EarliestAccessPlanner;
pub use replanner::ConsensusReplanner;
pub use runtime::{AgentEvent, AgentHandle, AgentRuntime, DEFAULT_INBOX_CAPACITY};
