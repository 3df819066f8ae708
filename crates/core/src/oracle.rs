//! Access oracle - precomputed visibility and contact windows.
//!
//! Orbit propagation and line-of-sight analysis happen elsewhere; planners only query
//! the results through [`AccessOracle`]. [`TabulatedOracle`] serves them from tables.

use crate::types::{AgentId, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed time interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    /// Start of the interval [s]
    pub start: f64,
    /// End of the interval [s]
    pub end: f64,
}

impl TimeInterval {
    /// Create an interval
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Interval that never opens
    pub fn never() -> Self {
        Self {
            start: f64::INFINITY,
            end: f64::INFINITY,
        }
    }

    /// Whether the interval opens at a finite time
    pub fn is_reachable(&self) -> bool {
        self.start.is_finite()
    }

    /// Whether `t` lies inside the interval
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Instant at which an agent can observe a target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    /// Access time [s]
    pub t: f64,
    /// Off-nadir look angle needed to point at the target [deg]
    pub look_angle: f64,
}

/// Queryable source of precomputed visibility data
pub trait AccessOracle: Send + Sync {
    /// Quantization step of the precomputed tables [s]
    fn time_step(&self) -> f64;

    /// Agents known to the oracle
    fn agents(&self) -> Vec<AgentId>;

    /// First communication window between two agents that is open at or after `t`.
    ///
    /// The returned window starts no earlier than `t`; [`TimeInterval::never`] when none.
    fn next_contact_window(&self, sender: &str, receiver: &str, t: f64) -> TimeInterval;

    /// Times in `[t_start, t_end]` at which `agent` can see `target` with `instrument`.
    ///
    /// Times lie on the oracle's [`time_step`](AccessOracle::time_step) grid.
    fn arrival_times(
        &self,
        agent: &str,
        target: &Vector3,
        instrument: &str,
        t_start: f64,
        t_end: f64,
    ) -> Vec<AccessPoint>;

    /// Propagated agent position at time `t`, if known
    fn position(&self, agent: &str, t: f64) -> Option<Vector3>;
}

/// One row of an access table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Observing agent
    pub agent: AgentId,
    /// Target ground point (lat, lon, alt)
    pub target: Vector3,
    /// Instrument able to observe the target
    pub instrument: String,
    /// Access time [s]
    pub t: f64,
    /// Look angle at that time [deg]
    pub look_angle: f64,
}

/// In-memory oracle backed by contact and access tables
#[derive(Debug, Clone, Default)]
pub struct TabulatedOracle {
    time_step: f64,
    agents: Vec<AgentId>,
    contacts: HashMap<(AgentId, AgentId), Vec<TimeInterval>>,
    accesses: Vec<AccessRecord>,
    positions: HashMap<AgentId, Vec<(f64, Vector3)>>,
}

const TARGET_TOLERANCE: f64 = 1e-6;

/// Snap `t` up to the next multiple of `step`
pub fn quantize(t: f64, step: f64) -> f64 {
    if step <= 0.0 || !t.is_finite() {
        return t;
    }
    (t / step - TARGET_TOLERANCE).ceil() * step
}

impl TabulatedOracle {
    /// Create an empty oracle with the given time step
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            ..Default::default()
        }
    }

    /// Register an agent
    pub fn add_agent(&mut self, agent: impl Into<AgentId>) {
        let agent = agent.into();
        if !self.agents.contains(&agent) {
            self.agents.push(agent);
        }
    }

    /// Register a symmetric contact window between two agents
    pub fn add_contact(&mut self, a: &str, b: &str, window: TimeInterval) {
        for key in [(a.to_string(), b.to_string()), (b.to_string(), a.to_string())] {
            let windows = self.contacts.entry(key).or_default();
            windows.push(window);
            windows.sort_by(|x, y| x.start.total_cmp(&y.start));
        }
        self.add_agent(a);
        self.add_agent(b);
    }

    /// Register an access opportunity
    pub fn add_access(&mut self, record: AccessRecord) {
        self.add_agent(record.agent.clone());
        self.accesses.push(record);
        self.accesses.sort_by(|x, y| x.t.total_cmp(&y.t));
    }

    /// Register a propagated position sample
    pub fn add_position(&mut self, agent: &str, t: f64, position: Vector3) {
        let samples = self.positions.entry(agent.to_string()).or_default();
        samples.push((t, position));
        samples.sort_by(|x, y| x.0.total_cmp(&y.0));
    }
}

fn same_target(a: &Vector3, b: &Vector3) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < TARGET_TOLERANCE)
}

impl AccessOracle for TabulatedOracle {
    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn agents(&self) -> Vec<AgentId> {
        self.agents.clone()
    }

    fn next_contact_window(&self, sender: &str, receiver: &str, t: f64) -> TimeInterval {
        self.contacts
            .get(&(sender.to_string(), receiver.to_string()))
            .and_then(|windows| windows.iter().find(|window| window.end >= t))
            .map(|window| TimeInterval::new(window.start.max(t), window.end))
            .unwrap_or_else(TimeInterval::never)
    }

    fn arrival_times(
        &self,
        agent: &str,
        target: &Vector3,
        instrument: &str,
        t_start: f64,
        t_end: f64,
    ) -> Vec<AccessPoint> {
        self.accesses
            .iter()
            .filter(|record| {
                record.agent == agent
                    && record.instrument == instrument
                    && same_target(&record.target, target)
            })
            .map(|record| AccessPoint {
                t: quantize(record.t, self.time_step),
                look_angle: record.look_angle,
            })
            .filter(|point| t_start <= point.t && point.t <= t_end)
            .collect()
    }

    fn position(&self, agent: &str, t: f64) -> Option<Vector3> {
        let samples = self.positions.get(agent)?;
        // latest sample at or before t, else the first one
        samples
            .iter()
            .rev()
            .find(|(time, _)| *time <= t)
            .or_else(|| samples.first())
            .map(|(_, position)| *position)
    }
}
