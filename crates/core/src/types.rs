//! Common identifiers and geometric primitives.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an agent in the fleet
pub type AgentId = String;

/// Cartesian position or lat/lon/alt triple
pub type Vector3 = [f64; 3];

/// Tolerance below which two instants are considered equal (seconds)
pub const TIME_EPSILON: f64 = 1e-3;

/// Reference to one subtask of a measurement request.
///
/// This is the key of the bid arena and the element type of bundles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskRef {
    /// Measurement request identifier
    pub req_id: String,
    /// Index into the request's measurement groups
    pub subtask_index: usize,
}

impl TaskRef {
    /// Create a new task reference
    pub fn new(req_id: impl Into<String>, subtask_index: usize) -> Self {
        Self {
            req_id: req_id.into(),
            subtask_index,
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.req_id.split('-').next().unwrap_or(&self.req_id);
        write!(f, "({}, {})", short, self.subtask_index)
    }
}
