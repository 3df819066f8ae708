//! Error types for feasibility scheduling.
//!
//! All variants are configuration failures raised when a scheduler is built or asked
//! to schedule for an agent type it cannot handle. Feasibility checks themselves
//! return booleans.

use thiserror::Error;

/// Errors that can occur when configuring or running the feasibility scheduler.
#[derive(Debug, Error, PartialEq)]
pub enum FeasibilityError {
    /// Agent has no attitude determination and control subsystem
    #[error("ADCS component specifications missing from agent specs")]
    MissingAdcs,

    /// ADCS is present but a required parameter is missing or not positive
    #[error("ADCS `{parameter}` specification missing or invalid")]
    InvalidAdcsParameter {
        /// Parameter name as it appears in agent specs
        parameter: &'static str,
    },

    /// Instrument has no usable field of view
    #[error("Field of view specification missing for instrument `{instrument}`")]
    MissingFieldOfView {
        /// Instrument name
        instrument: String,
    },

    /// Agent state type is not supported by the scheduler
    #[error("Maneuver scheduling not supported for agents of type `{0}`")]
    UnsupportedState(String),
}

/// Result type for feasibility operations.
pub type FeasibilityResult<T> = Result<T, FeasibilityError>;
