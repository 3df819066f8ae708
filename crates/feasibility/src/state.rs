//! Agent state snapshots.

use serde::{Deserialize, Serialize};
use skyweave_core::{AccessOracle, AgentId, Vector3};

/// Kinematic and attitude state of an orbiting agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteState {
    /// Agent name
    pub agent: AgentId,
    /// Time of the snapshot [s]
    pub t: f64,
    /// Position [km]
    pub pos: Vector3,
    /// Velocity [km/s]
    pub vel: Vector3,
    /// Attitude as roll, pitch, yaw [deg]; roll is the off-nadir look angle
    pub attitude: Vector3,
    /// Attitude rates [deg/s]
    pub attitude_rates: Vector3,
}

/// Kinematic state of an aerial agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UavState {
    /// Agent name
    pub agent: AgentId,
    /// Time of the snapshot [s]
    pub t: f64,
    /// Position [km]
    pub pos: Vector3,
    /// Velocity [km/s]
    pub vel: Vector3,
}

/// State reported by the executor for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state_type", rename_all = "snake_case")]
pub enum AgentState {
    /// Orbiting agent
    Satellite(SatelliteState),
    /// Aerial agent
    Uav(UavState),
}

impl AgentState {
    /// Agent name
    pub fn agent(&self) -> &str {
        match self {
            AgentState::Satellite(state) => &state.agent,
            AgentState::Uav(state) => &state.agent,
        }
    }

    /// Time of the snapshot
    pub fn t(&self) -> f64 {
        match self {
            AgentState::Satellite(state) => state.t,
            AgentState::Uav(state) => state.t,
        }
    }

    /// Position at the snapshot
    pub fn pos(&self) -> Vector3 {
        match self {
            AgentState::Satellite(state) => state.pos,
            AgentState::Uav(state) => state.pos,
        }
    }

    /// Current look angle, for agents that point
    pub fn look_angle(&self) -> Option<f64> {
        match self {
            AgentState::Satellite(state) => Some(state.attitude[0]),
            AgentState::Uav(_) => None,
        }
    }

    /// Short type name for errors and logging
    pub fn type_name(&self) -> &'static str {
        match self {
            AgentState::Satellite(_) => "satellite",
            AgentState::Uav(_) => "uav",
        }
    }

    /// Advance the snapshot to time `t`, taking the position from the oracle when known
    pub fn propagate(&self, t: f64, oracle: &dyn AccessOracle) -> AgentState {
        let pos = oracle.position(self.agent(), t).unwrap_or_else(|| self.pos());
        match self {
            AgentState::Satellite(state) => AgentState::Satellite(SatelliteState {
                t,
                pos,
                ..state.clone()
            }),
            AgentState::Uav(state) => AgentState::Uav(UavState {
                t,
                pos,
                ..state.clone()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyweave_core::TabulatedOracle;

    fn satellite() -> AgentState {
        AgentState::Satellite(SatelliteState {
            agent: "sat-1".to_string(),
            t: 0.0,
            pos: [7000.0, 0.0, 0.0],
            vel: [0.0, 7.5, 0.0],
            attitude: [10.0, 0.0, 0.0],
            attitude_rates: [0.0; 3],
        })
    }

    #[test]
    fn test_accessors() {
        let state = satellite();
        assert_eq!(state.agent(), "sat-1");
        assert_eq!(state.look_angle(), Some(10.0));
        assert_eq!(state.type_name(), "satellite");
    }

    #[test]
    fn test_propagate_uses_oracle_position() {
        let mut oracle = TabulatedOracle::new(1.0);
        oracle.add_position("sat-1", 100.0, [0.0, 7000.0, 0.0]);

        let future = satellite().propagate(120.0, &oracle);
        assert_eq!(future.t(), 120.0);
        assert_eq!(future.pos(), [0.0, 7000.0, 0.0]);
        assert_eq!(future.look_angle(), Some(10.0));
    }

    #[test]
    fn test_propagate_without_ephemeris_keeps_position() {
        let oracle = TabulatedOracle::new(1.0);
        let future = satellite().propagate(50.0, &oracle);
        assert_eq!(future.pos(), [7000.0, 0.0, 0.0]);
    }
}
