//! Error types for Skyweave planners and the agent runtime.

use skyweave_feasibility::FeasibilityError;
use skyweave_mesh::MeshError;
use thiserror::Error;

/// Errors that can occur while planning or running an agent.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Agent configuration is unusable
    #[error("Feasibility error: {0}")]
    Feasibility(#[from] FeasibilityError),

    /// A broadcast could not be prepared
    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    /// A runtime channel closed while the agent was still running
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    /// A runtime task panicked or was aborted
    #[error("Runtime task failed: {0}")]
    Task(String),
}

/// Result type for planner operations.
pub type PlannerResult<T> = Result<T, PlannerError>;
