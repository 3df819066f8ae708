//! Core types for the Skyweave decentralized tasking system.
//!
//! This crate provides the data model shared by every Skyweave crate: measurement
//! requests and bids, planner actions and plans, inter-agent messages, the access
//! oracle interface, utility functions, configuration and logging.

pub mod action;
pub mod bid;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod oracle;
pub mod plan;
pub mod request;
pub mod types;
pub mod utility;

pub use action::{ActionKind, ActionStatus, AgentAction, ObservationAction};
pub use bid::Bid;
pub use config::{
    ClockConfig, Config, LoggingConfig, PlannerConfig, PreplannerKind, ReplannerKind,
};
pub use error::{CoreError, CoreResult};
pub use message::{
    Envelope, MeasurementBidMessage, MeasurementRequestMessage, Message,
    ObservationPerformedMessage, PlanMessage,
};
pub use oracle::{AccessOracle, AccessPoint, AccessRecord, TabulatedOracle, TimeInterval};
pub use plan::Plan;
pub use request::{MeasurementGroup, MeasurementRequest};
pub use types::{AgentId, TaskRef, Vector3, TIME_EPSILON};
pub use utility::{synergy_factor, UtilityFunction};
