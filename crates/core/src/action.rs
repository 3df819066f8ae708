//! Actions produced by planners for an external executor.

use crate::message::Message;
use crate::types::{AgentId, TaskRef, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution status of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Not yet executed
    Pending,
    /// Executed successfully
    Completed,
    /// Executor gave up on the action
    Aborted,
}

/// An observation of one subtask of a measurement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationAction {
    /// Measurement request identifier
    pub req_id: String,
    /// Subtask being performed
    pub subtask_index: usize,
    /// Instrument used
    pub instrument: String,
    /// Target ground point (lat, lon, alt)
    pub target: Vector3,
    /// Off-nadir look angle required [deg]
    pub look_angle: f64,
    /// Utility credited for the observation
    pub utility: f64,
    /// Start of imaging [s]
    pub t_start: f64,
    /// End of imaging [s]
    pub t_end: f64,
}

impl ObservationAction {
    /// Subtask this observation performs
    pub fn task(&self) -> TaskRef {
        TaskRef::new(self.req_id.clone(), self.subtask_index)
    }
}

/// What an action does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Reorient to a target attitude
    Maneuver {
        /// Final attitude (roll, pitch, yaw) [deg]
        final_attitude: Vector3,
    },
    /// Move along the agent's trajectory to a position
    Travel {
        /// Position reached at the end of the action
        final_position: Vector3,
    },
    /// Perform an observation
    Observation(ObservationAction),
    /// Send a message, relayed along `path`
    Broadcast {
        /// Payload
        message: Message,
        /// Relay hops after the sender
        path: Vec<AgentId>,
    },
    /// Idle while listening for messages
    WaitForMessages,
    /// Do nothing
    Idle,
}

/// A timed action for the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    /// Unique action identifier
    pub id: String,
    /// Action payload
    pub kind: ActionKind,
    /// Start time [s]
    pub t_start: f64,
    /// End time [s]
    pub t_end: f64,
    /// Execution status
    pub status: ActionStatus,
}

impl AgentAction {
    fn new(kind: ActionKind, t_start: f64, t_end: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            t_start,
            t_end,
            status: ActionStatus::Pending,
        }
    }

    /// Reorientation action
    pub fn maneuver(final_attitude: Vector3, t_start: f64, t_end: f64) -> Self {
        Self::new(ActionKind::Maneuver { final_attitude }, t_start, t_end)
    }

    /// Travel action
    pub fn travel(final_position: Vector3, t_start: f64, t_end: f64) -> Self {
        Self::new(ActionKind::Travel { final_position }, t_start, t_end)
    }

    /// Observation action spanning the observation's own imaging window
    pub fn observation(observation: ObservationAction) -> Self {
        let (t_start, t_end) = (observation.t_start, observation.t_end);
        Self::new(ActionKind::Observation(observation), t_start, t_end)
    }

    /// Instantaneous broadcast
    pub fn broadcast(message: Message, path: Vec<AgentId>, t_start: f64) -> Self {
        Self::new(ActionKind::Broadcast { message, path }, t_start, t_start)
    }

    /// Wait for incoming messages
    pub fn wait_for_messages(t_start: f64, t_end: f64) -> Self {
        Self::new(ActionKind::WaitForMessages, t_start, t_end)
    }

    /// Idle
    pub fn idle(t_start: f64, t_end: f64) -> Self {
        Self::new(ActionKind::Idle, t_start, t_end)
    }

    /// Duration of the action [s]
    pub fn duration(&self) -> f64 {
        self.t_end - self.t_start
    }

    /// Observation payload, if this is an observation
    pub fn as_observation(&self) -> Option<&ObservationAction> {
        match &self.kind {
            ActionKind::Observation(observation) => Some(observation),
            _ => None,
        }
    }

    /// Whether this is a broadcast action
    pub fn is_broadcast(&self) -> bool {
        matches!(self.kind, ActionKind::Broadcast { .. })
    }

    /// Short action name for logging
    pub fn name(&self) -> &'static str {
        match self.kind {
            ActionKind::Maneuver { .. } => "maneuver",
            ActionKind::Travel { .. } => "travel",
            ActionKind::Observation(_) => "observation",
            ActionKind::Broadcast { .. } => "broadcast",
            ActionKind::WaitForMessages => "wait",
            ActionKind::Idle => "idle",
        }
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:.3}, {:.3}]", self.name(), self.t_start, self.t_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_is_instantaneous() {
        let action = AgentAction::broadcast(
            Message::ObservationPerformed(crate::message::ObservationPerformedMessage {
                src: "a".to_string(),
                observation: ObservationAction {
                    req_id: "r".to_string(),
                    subtask_index: 0,
                    instrument: "A".to_string(),
                    target: [0.0, 0.0, 0.0],
                    look_angle: 0.0,
                    utility: 1.0,
                    t_start: 1.0,
                    t_end: 2.0,
                },
            }),
            vec![],
            5.0,
        );
        assert!(action.is_broadcast());
        assert_eq!(action.duration(), 0.0);
        assert_eq!(action.status, ActionStatus::Pending);
    }

    #[test]
    fn test_observation_uses_imaging_window() {
        let action = AgentAction::observation(ObservationAction {
            req_id: "r".to_string(),
            subtask_index: 1,
            instrument: "A".to_string(),
            target: [0.0, 0.0, 0.0],
            look_angle: 12.0,
            utility: 1.0,
            t_start: 10.0,
            t_end: 20.0,
        });
        assert_eq!(action.t_start, 10.0);
        assert_eq!(action.t_end, 20.0);
        assert_eq!(action.as_observation().map(|o| o.task()), Some(TaskRef::new("r", 1)));
        assert_eq!(action.to_string(), "observation[10.000, 20.000]");
    }
}
