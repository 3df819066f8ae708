//! In-process simulation: every agent's runtime against a simulated executor and mesh.
//!
//! Time advances in fixed steps. At each step the executor reports finished actions,
//! releases generated requests, publishes the new agent states and collects the
//! actions each planner wants started. Broadcasts reach every agent in contact with
//! the sender and are delivered at the following step.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::Serialize;
use skyweave_core::{
    AccessOracle, ActionKind, ActionStatus, AgentAction, AgentId, Bid, Config, Envelope,
    MeasurementRequest,
};
use skyweave_feasibility::{AgentState, SatelliteState};
use skyweave_planner::{AgentEvent, AgentHandle, AgentRuntime, PlanningModule};
use tracing::{debug, info};

use crate::scenario::ScenarioConfig;

/// Observation carried out during the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformedObservation {
    /// Observing agent
    pub agent: AgentId,
    /// Measurement request
    pub req_id: String,
    /// Subtask performed
    pub subtask_index: usize,
    /// Imaging start [s]
    pub t_start: f64,
    /// Utility credited
    pub utility: f64,
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Scenario name
    pub scenario: String,
    /// Observations in completion order
    pub observations: Vec<PerformedObservation>,
    /// Winner of every subtask, per the most recent bid any agent holds
    pub assignments: BTreeMap<String, Option<AgentId>>,
    /// Envelopes handed to receivers
    pub messages_delivered: usize,
}

impl SimulationReport {
    /// Total utility of the observations performed
    pub fn total_utility(&self) -> f64 {
        self.observations.iter().map(|o| o.utility).sum()
    }

    /// Agent assigned to `req_id`'s subtask `subtask_index`, if any
    pub fn winner(&self, req_id: &str, subtask_index: usize) -> Option<&str> {
        self.assignments
            .get(&format!("{req_id}/{subtask_index}"))
            .and_then(|winner| winner.as_deref())
    }
}

/// Executor-side view of one agent
struct SimAgent {
    name: AgentId,
    handle: AgentHandle,
    state: SatelliteState,
    /// Started actions and the time they complete
    running: Vec<(AgentAction, f64)>,
    started: HashSet<String>,
}

/// Scenario runner
pub struct Simulation {
    scenario: ScenarioConfig,
    config: Config,
}

impl Simulation {
    /// Prepare a run; `config` overrides the scenario's own planner configuration
    pub fn new(scenario: ScenarioConfig, config: Option<Config>) -> Self {
        let config = config
            .or_else(|| scenario.config.clone())
            .unwrap_or_else(Config::default_config);
        Self { scenario, config }
    }

    /// Run the scenario to completion
    pub async fn run(self) -> anyhow::Result<SimulationReport> {
        let oracle: Arc<dyn AccessOracle> = Arc::new(self.scenario.oracle());
        let runtime = AgentRuntime::default();

        let mut agents = Vec::with_capacity(self.scenario.agents.len());
        for agent in &self.scenario.agents {
            let module = PlanningModule::new(agent.name.clone(), &self.config, &agent.specs)
                .with_context(|| format!("failed to configure agent {}", agent.name))?;
            let AgentState::Satellite(state) = agent.initial_state() else {
                return Err(anyhow!("agent {} is not a satellite", agent.name));
            };
            agents.push(SimAgent {
                name: agent.name.clone(),
                handle: runtime.spawn(module, Arc::clone(&oracle)),
                state,
                running: Vec::new(),
                started: HashSet::new(),
            });
        }
        let index: HashMap<AgentId, usize> = agents
            .iter()
            .enumerate()
            .map(|(i, agent)| (agent.name.clone(), i))
            .collect();

        let mut releases: Vec<(f64, AgentId, MeasurementRequest)> = self
            .scenario
            .requests
            .iter()
            .map(|request| -> anyhow::Result<(f64, AgentId, MeasurementRequest)> {
                Ok((request.t_release, request.requester.clone(), request.to_request()?))
            })
            .collect::<anyhow::Result<_>>()?;
        releases.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut releases = releases.into_iter().peekable();

        info!(
            scenario = %self.scenario.name,
            agents = agents.len(),
            requests = self.scenario.requests.len(),
            duration = self.scenario.duration,
            "Simulation started"
        );

        let dt = self.config.clock.step().unwrap_or(self.scenario.time_step);
        let steps = (self.scenario.duration / dt).floor() as usize;
        let mut in_flight: Vec<(usize, Envelope)> = Vec::new();
        let mut observations = Vec::new();
        let mut messages_delivered = 0;

        for step in 0..=steps {
            let t = step as f64 * dt;

            for (recipient, envelope) in in_flight.drain(..) {
                agents[recipient]
                    .handle
                    .send(AgentEvent::Envelope(envelope))
                    .await?;
                messages_delivered += 1;
            }

            for agent in agents.iter_mut() {
                for action in finish_actions(agent, t) {
                    if let ActionKind::Observation(observation) = &action.kind {
                        info!(agent = %agent.name, req = %observation.req_id, t, "Observation performed");
                        observations.push(PerformedObservation {
                            agent: agent.name.clone(),
                            req_id: observation.req_id.clone(),
                            subtask_index: observation.subtask_index,
                            t_start: observation.t_start,
                            utility: observation.utility,
                        });
                    }
                    agent.handle.send(AgentEvent::ActionStatus(action)).await?;
                }
            }

            while let Some((_, requester, req)) = releases.next_if(|(t_release, _, _)| *t_release <= t) {
                let i = *index
                    .get(&requester)
                    .ok_or_else(|| anyhow!("unknown requester {requester}"))?;
                agents[i].handle.send(AgentEvent::GeneratedRequest(req)).await?;
            }

            for agent in agents.iter_mut() {
                agent.state.t = t;
                if let Some(pos) = oracle.position(&agent.name, t) {
                    agent.state.pos = pos;
                }
                let state = AgentState::Satellite(agent.state.clone());
                agent.handle.send(AgentEvent::State(state)).await?;
            }

            for i in 0..agents.len() {
                let actions = agents[i]
                    .handle
                    .next_actions()
                    .await
                    .ok_or_else(|| anyhow!("agent {} stopped unexpectedly", agents[i].name))?;

                for action in actions {
                    if !agents[i].started.insert(action.id.clone()) {
                        continue;
                    }
                    if let ActionKind::Broadcast { message, path } = &action.kind {
                        let envelope = Envelope::new(agents[i].name.clone(), path.clone(), message.clone())?;
                        for (j, other) in agents.iter().enumerate() {
                            if j != i
                                && oracle
                                    .next_contact_window(&agents[i].name, &other.name, t)
                                    .contains(t)
                            {
                                in_flight.push((j, envelope.clone()));
                            }
                        }
                        debug!(agent = %agents[i].name, kind = message.kind(), t, "Broadcast sent");
                    }
                    let t_done = action.t_end.max(t);
                    agents[i].running.push((action, t_done));
                }
            }
        }

        let mut bids: HashMap<String, Bid> = HashMap::new();
        for agent in agents {
            agent.handle.send(AgentEvent::SimulationEnd).await?;
            let module = agent.handle.join().await?;
            for bid in module.known_bids() {
                let key = format!("{}/{}", bid.req_id, bid.subtask_index);
                match bids.get(&key) {
                    Some(existing) if existing.t_update >= bid.t_update => {}
                    _ => {
                        bids.insert(key, bid);
                    }
                }
            }
        }

        let assignments = bids
            .into_iter()
            .map(|(key, bid)| (key, bid.winner))
            .collect();

        let report = SimulationReport {
            scenario: self.scenario.name.clone(),
            observations,
            assignments,
            messages_delivered,
        };
        info!(
            scenario = %report.scenario,
            observations = report.observations.len(),
            utility = report.total_utility(),
            "Simulation finished"
        );
        Ok(report)
    }
}

/// Complete the actions of `agent` that end by `t` and apply their effects
fn finish_actions(agent: &mut SimAgent, t: f64) -> Vec<AgentAction> {
    let (done, running): (Vec<_>, Vec<_>) = agent
        .running
        .drain(..)
        .partition(|(_, t_done)| *t_done <= t);
    agent.running = running;

    done.into_iter()
        .map(|(mut action, _)| {
            match &action.kind {
                ActionKind::Maneuver { final_attitude } => agent.state.attitude = *final_attitude,
                ActionKind::Travel { final_position } => agent.state.pos = *final_position,
                _ => {}
            }
            action.status = ActionStatus::Completed;
            action
        })
        .collect()
}
