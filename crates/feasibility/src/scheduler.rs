//! Feasibility scheduler - slew-constrained observation sequencing.
//!
//! Validates ordered observation sequences against the agent's attitude agility and
//! turns them into timed maneuver, travel and wait actions for the executor.

use crate::clock::TimeGrid;
use crate::error::{FeasibilityError, FeasibilityResult};
use crate::specs::AgentSpecs;
use crate::state::AgentState;
use skyweave_core::{AccessOracle, AgentAction, ClockConfig, ObservationAction};
use std::collections::HashMap;
use tracing::debug;

/// Actions shorter than this are not emitted [s]
pub const MIN_ACTION_DURATION: f64 = 1e-3;

/// Slack allowed when comparing maneuver time against the available gap [s]
const SLEW_TOLERANCE: f64 = 1e-9;

/// Pointing feasibility and maneuver scheduling for one agent
#[derive(Debug, Clone)]
pub struct FeasibilityScheduler {
    /// Maximum slew rate [deg/s]
    max_rate: f64,
    /// Maximum reaction wheel torque; validated but not yet constraining
    max_torque: f64,
    /// Cross-track field of view per instrument [deg]
    cross_track_fovs: HashMap<String, f64>,
}

impl FeasibilityScheduler {
    /// Build a scheduler from agent specifications.
    ///
    /// Fails if the ADCS or any instrument field of view is missing.
    pub fn new(specs: &AgentSpecs) -> FeasibilityResult<Self> {
        let adcs = specs.adcs.ok_or(FeasibilityError::MissingAdcs)?;

        let max_rate = adcs
            .max_rate
            .filter(|rate| *rate > 0.0 && rate.is_finite())
            .ok_or(FeasibilityError::InvalidAdcsParameter {
                parameter: "maxRate",
            })?;
        let max_torque = adcs
            .max_torque
            .filter(|torque| *torque >= 0.0)
            .ok_or(FeasibilityError::InvalidAdcsParameter {
                parameter: "maxTorque",
            })?;

        let mut cross_track_fovs = HashMap::new();
        for instrument in &specs.instruments {
            let fov = instrument
                .cross_track_fov()
                .ok_or_else(|| FeasibilityError::MissingFieldOfView {
                    instrument: instrument.name.clone(),
                })?;
            cross_track_fovs.insert(instrument.name.clone(), fov);
        }

        Ok(Self {
            max_rate,
            max_torque,
            cross_track_fovs,
        })
    }

    /// Maximum slew rate [deg/s]
    pub fn max_rate(&self) -> f64 {
        self.max_rate
    }

    /// Maximum reaction wheel torque
    pub fn max_torque(&self) -> f64 {
        self.max_torque
    }

    /// Whether the agent carries `instrument`
    pub fn supports(&self, instrument: &str) -> bool {
        self.cross_track_fovs.contains_key(instrument)
    }

    /// Cross-track field of view of an instrument [deg]
    pub fn cross_track_fov(&self, instrument: &str) -> Option<f64> {
        self.cross_track_fovs.get(instrument).copied()
    }

    /// Time needed to repoint from `from` to `to` for an observation with `instrument`.
    ///
    /// Zero when the target is already inside half the field of view. `None` for
    /// unknown instruments or non-finite angles.
    pub fn maneuver_time(&self, from: f64, to: f64, instrument: &str) -> Option<f64> {
        let fov = self.cross_track_fov(instrument)?;
        if !from.is_finite() || !to.is_finite() {
            return None;
        }

        let dth = (to - from).abs();
        if dth <= fov / 2.0 {
            Some(0.0)
        } else {
            Some(dth / self.max_rate)
        }
    }

    /// Whether repointing in `dt_maneuver` fits in a gap of `dt_available`
    pub fn fits(dt_maneuver: f64, dt_available: f64) -> bool {
        dt_maneuver - dt_available < SLEW_TOLERANCE
    }

    /// Check whether an ordered observation sequence can be performed from `state`.
    ///
    /// Each observation must be reachable from the previous one (the first from the
    /// current attitude) within the time between them.
    pub fn is_path_valid(&self, state: &AgentState, observations: &[ObservationAction]) -> bool {
        let AgentState::Satellite(satellite) = state else {
            return false;
        };

        let mut th_prev = satellite.attitude[0];
        let mut t_prev = satellite.t;

        for observation in observations {
            let Some(dt_maneuver) =
                self.maneuver_time(th_prev, observation.look_angle, &observation.instrument)
            else {
                return false;
            };

            let dt_available = observation.t_start - t_prev;
            if !Self::fits(dt_maneuver, dt_available) {
                return false;
            }

            th_prev = observation.look_angle;
            t_prev = observation.t_end;
        }

        true
    }

    /// Turn an ordered observation sequence into maneuver, travel and wait actions.
    ///
    /// Observations themselves are not included in the output.
    pub fn schedule_maneuvers(
        &self,
        state: &AgentState,
        observations: &[ObservationAction],
        clock: &ClockConfig,
        oracle: &dyn AccessOracle,
    ) -> FeasibilityResult<Vec<AgentAction>> {
        let AgentState::Satellite(satellite) = state else {
            return Err(FeasibilityError::UnsupportedState(
                state.type_name().to_string(),
            ));
        };

        let mut actions = Vec::new();
        let mut attitude = satellite.attitude;
        let mut t_prev = satellite.t;

        for observation in observations {
            let t_img = observation.t_start;
            let fov = self.cross_track_fov(&observation.instrument).ok_or_else(|| {
                FeasibilityError::MissingFieldOfView {
                    instrument: observation.instrument.clone(),
                }
            })?;

            // Point at the target unless it is already in view
            let dth = (observation.look_angle - attitude[0]).abs();
            let th_f = if dth <= fov / 2.0 {
                attitude[0]
            } else {
                observation.look_angle
            };

            let t_maneuver_start = t_prev;
            let t_maneuver_end = t_maneuver_start + (th_f - attitude[0]).abs() / self.max_rate;
            let mut t_move_start = t_prev;
            if t_maneuver_end - t_maneuver_start >= MIN_ACTION_DURATION {
                attitude = [th_f, 0.0, 0.0];
                actions.push(AgentAction::maneuver(attitude, t_maneuver_start, t_maneuver_end));
                t_move_start = t_maneuver_end;
            }

            // Travel to the imaging position
            let final_position = state.propagate(t_img, oracle).pos();
            let t_move_start = clock.snap_start(t_move_start);
            let t_move_end = clock.snap_end(t_img);
            if (t_move_end - t_move_start).abs() >= MIN_ACTION_DURATION {
                actions.push(AgentAction::travel(final_position, t_move_start, t_move_end));
            }

            if t_move_end < t_img {
                actions.push(AgentAction::wait_for_messages(t_move_end, t_img));
            }

            t_prev = observation.t_end;
        }

        debug!(
            agent = %satellite.agent,
            observations = observations.len(),
            actions = actions.len(),
            "Scheduled maneuvers"
        );

        Ok(actions)
    }
}
