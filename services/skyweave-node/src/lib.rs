//! Skyweave Node - scenario runner
//!
//! Loads a scenario file and runs every agent's planning runtime in-process against a
//! simulated executor and mesh, then reports who observed what.

#![warn(missing_docs)]

pub mod scenario;
pub mod simulation;

pub use scenario::{AgentConfig, ContactConfig, RequestConfig, ScenarioConfig};
pub use simulation::{PerformedObservation, Simulation, SimulationReport};
