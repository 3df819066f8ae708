//! Scenario files: agents, requests and precomputed visibility for one run.

use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;
use skyweave_core::{
    AccessRecord, AgentId, Config, MeasurementRequest, TabulatedOracle, TimeInterval, Vector3,
};
use skyweave_feasibility::{AgentSpecs, AgentState, SatelliteState};

/// A complete simulation scenario
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario name, for logs
    #[serde(default = "default_name")]
    pub name: String,
    /// Simulated duration [s]
    pub duration: f64,
    /// Simulation step [s]
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    /// Planner configuration shared by every agent; `--config` takes precedence
    #[serde(default)]
    pub config: Option<Config>,
    /// Participating agents
    pub agents: Vec<AgentConfig>,
    /// Requests released during the run
    #[serde(default)]
    pub requests: Vec<RequestConfig>,
    /// Inter-agent contact windows
    #[serde(default)]
    pub contacts: Vec<ContactConfig>,
    /// Target access table
    #[serde(default)]
    pub accesses: Vec<AccessRecord>,
}

/// One agent of the scenario
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Agent name
    pub name: AgentId,
    /// Hardware specifications
    pub specs: AgentSpecs,
    /// Initial position [km]
    #[serde(default)]
    pub pos: Vector3,
    /// Initial velocity [km/s]
    #[serde(default)]
    pub vel: Vector3,
    /// Initial attitude [deg]
    #[serde(default)]
    pub attitude: Vector3,
}

impl AgentConfig {
    /// State of the agent at the start of the run
    pub fn initial_state(&self) -> AgentState {
        AgentState::Satellite(SatelliteState {
            agent: self.name.clone(),
            t: 0.0,
            pos: self.pos,
            vel: self.vel,
            attitude: self.attitude,
            attitude_rates: [0.0; 3],
        })
    }
}

/// A request and the agent that generates it
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    /// Request identifier
    pub id: String,
    /// Agent whose sensors generate the request
    pub requester: AgentId,
    /// Time the request is generated [s]
    #[serde(default)]
    pub t_release: f64,
    /// Target ground point
    pub target: Vector3,
    /// Maximum science score
    pub s_max: f64,
    /// Measurement types
    pub measurements: Vec<String>,
    /// Availability window start [s]
    pub t_start: f64,
    /// Availability window end [s]; may be `inf`
    pub t_end: f64,
    /// Correlation time between synergistic measurements [s]
    #[serde(default)]
    pub t_corr: f64,
    /// Measurement duration [s]
    pub duration: f64,
}

impl RequestConfig {
    /// Build the measurement request
    pub fn to_request(&self) -> anyhow::Result<MeasurementRequest> {
        let req = MeasurementRequest::new(
            self.target,
            self.s_max,
            self.measurements.clone(),
            self.t_start,
            self.t_end,
            self.t_corr,
            self.duration,
        )
        .with_context(|| format!("invalid request {}", self.id))?;
        Ok(req.with_id(self.id.clone()).with_requester(self.requester.clone()))
    }
}

/// Symmetric contact window between two agents
#[derive(Debug, Clone, Deserialize)]
pub struct ContactConfig {
    /// First agent
    pub a: AgentId,
    /// Second agent
    pub b: AgentId,
    /// Window start [s]
    pub start: f64,
    /// Window end [s]; may be `inf`
    pub end: f64,
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_time_step() -> f64 {
    1.0
}

impl ScenarioConfig {
    /// Load a scenario from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a scenario
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let scenario: Self = toml::from_str(content).context("failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check that the scenario is runnable
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.time_step > 0.0) || !self.time_step.is_finite() {
            bail!("time_step must be positive and finite, got {}", self.time_step);
        }
        if !(self.duration >= 0.0) || !self.duration.is_finite() {
            bail!("duration must be finite and non-negative, got {}", self.duration);
        }
        if self.agents.is_empty() {
            bail!("scenario has no agents");
        }

        let known = |name: &str| self.agents.iter().any(|agent| agent.name == name);
        for request in &self.requests {
            if !known(&request.requester) {
                bail!("request {} names unknown requester {}", request.id, request.requester);
            }
        }
        for contact in &self.contacts {
            if !known(&contact.a) || !known(&contact.b) {
                bail!("contact {}-{} names an unknown agent", contact.a, contact.b);
            }
        }
        if let Some(config) = &self.config {
            config.validate()?;
        }
        Ok(())
    }

    /// Oracle serving this scenario's contact and access tables
    pub fn oracle(&self) -> TabulatedOracle {
        let mut oracle = TabulatedOracle::new(self.time_step);
        for agent in &self.agents {
            oracle.add_agent(agent.name.clone());
        }
        for contact in &self.contacts {
            oracle.add_contact(
                &contact.a,
                &contact.b,
                TimeInterval::new(contact.start, contact.end),
            );
        }
        for access in &self.accesses {
            oracle.add_access(access.clone());
        }
        oracle
    }
}
