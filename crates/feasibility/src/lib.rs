//! Skyweave Feasibility - pointing constraints for observation sequences.
//!
//! Given an agent's ADCS agility and instrument fields of view, decides whether an
//! ordered list of observations can be performed, and produces the maneuver, travel
//! and wait actions that realize it.

#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod scheduler;
pub mod specs;
pub mod state;

pub use clock::TimeGrid;
pub use error::{FeasibilityError, FeasibilityResult};
pub use scheduler::{FeasibilityScheduler, MIN_ACTION_DURATION};
pub use specs::{AdcsSpec, AgentSpecs, FieldOfView, InstrumentSpec};
pub use state::{AgentState, SatelliteState, UavState};
