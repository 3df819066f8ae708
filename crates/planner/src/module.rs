//! Planning module: one agent's planning loop step.
//!
//! Combines the configured preplanner and replanner over a single active plan,
//! forwards relayed messages and announces requests the agent generated itself.

use std::collections::HashSet;
use std::sync::Arc;

use skyweave_core::{
    AccessOracle, ActionStatus, AgentAction, AgentId, Bid, ClockConfig, Config, Message,
    MeasurementRequest, MeasurementRequestMessage, Plan, PreplannerKind, ReplannerKind,
};
use skyweave_feasibility::{AgentSpecs, AgentState, FeasibilityScheduler};
use skyweave_mesh::BroadcastScheduler;
use tracing::{debug, info, warn};

use crate::error::PlannerResult;
use crate::planner::{Percepts, Planner, PlanningContext};
use crate::preplanner::EarliestAccessPlanner;
use crate::replanner::ConsensusReplanner;

/// Per-agent planning state
pub struct PlanningModule {
    agent: AgentId,
    clock: ClockConfig,
    horizon: f64,
    preplanner: Option<Box<dyn Planner>>,
    replanner: Option<Box<dyn Planner>>,
    plan: Plan,
    broadcasts: BroadcastScheduler,
    /// Relays whose next hop was out of reach
    pending_relays: Vec<(Message, Vec<AgentId>)>,
    /// Self-generated requests not yet announced
    pending_requests: Vec<MeasurementRequest>,
    announced: HashSet<String>,
}

impl PlanningModule {
    /// Build the planners selected in `config` for an agent with `specs`
    pub fn new(agent: impl Into<AgentId>, config: &Config, specs: &AgentSpecs) -> PlannerResult<Self> {
        let agent = agent.into();
        let scheduler = Arc::new(FeasibilityScheduler::new(specs)?);

        let preplanner: Option<Box<dyn Planner>> = match config.planner.preplanner {
            PreplannerKind::EarliestAccess => Some(Box::new(EarliestAccessPlanner::new(
                agent.clone(),
                Arc::clone(&scheduler),
                &config.planner,
            ))),
            PreplannerKind::None => None,
        };
        let replanner: Option<Box<dyn Planner>> = match config.planner.replanner {
            ReplannerKind::Consensus => Some(Box::new(ConsensusReplanner::new(
                agent.clone(),
                scheduler,
                &config.planner,
            ))),
            ReplannerKind::None => None,
        };

        info!(
            agent = %agent,
            preplanner = preplanner.as_ref().map_or("none", |p| p.name()),
            replanner = replanner.as_ref().map_or("none", |p| p.name()),
            "Planning module ready"
        );

        Ok(Self {
            broadcasts: BroadcastScheduler::new(agent.clone()),
            agent,
            clock: config.clock,
            horizon: config.planner.horizon,
            preplanner,
            replanner,
            plan: Plan::empty(),
            pending_relays: Vec::new(),
            pending_requests: Vec::new(),
            announced: HashSet::new(),
        })
    }

    /// Agent this module plans for
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Active plan
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Bids known to the replanner
    pub fn known_bids(&self) -> Vec<Bid> {
        self.replanner
            .as_ref()
            .map(|planner| planner.known_bids())
            .unwrap_or_default()
    }

    /// Run one planning cycle and return the actions to start now
    pub fn step(
        &mut self,
        state: &AgentState,
        percepts: Percepts,
        oracle: &dyn AccessOracle,
    ) -> PlannerResult<Vec<AgentAction>> {
        let t = state.t();

        for action in &percepts.completed_actions {
            self.plan.update_action_status(&action.id, ActionStatus::Completed);
        }
        for action in &percepts.aborted_actions {
            if self
                .plan
                .update_action_status(&action.id, ActionStatus::Aborted)
                .is_some()
            {
                debug!(agent = %self.agent, action = %action, "Action aborted");
            }
        }

        {
            let ctx = PlanningContext::new(state, &self.plan, oracle, &self.clock);
            for planner in self.preplanner.iter_mut().chain(self.replanner.iter_mut()) {
                planner.update_percepts(&ctx, &percepts);
            }
        }

        if let Some(preplanner) = self.preplanner.as_mut() {
            let plan = {
                let ctx = PlanningContext::new(state, &self.plan, oracle, &self.clock);
                if preplanner.needs_planning(&ctx) {
                    Some(preplanner.generate_plan(&ctx)?)
                } else {
                    None
                }
            };
            if let Some(plan) = plan {
                debug!(agent = %self.agent, actions = plan.len(), "Preplan generated");
                self.plan = plan;
            }
        }

        if let Some(replanner) = self.replanner.as_mut() {
            let plan = {
                let ctx = PlanningContext::new(state, &self.plan, oracle, &self.clock);
                if replanner.needs_planning(&ctx) {
                    Some(replanner.generate_plan(&ctx)?)
                } else {
                    None
                }
            };
            if let Some(plan) = plan {
                self.plan = plan;
            }
        }

        let mut outgoing = self.schedule_relays(percepts.relays, oracle, t)?;
        self.pending_requests.extend(
            percepts
                .generated_requests
                .into_iter()
                .filter(|req| !self.announced.contains(&req.id)),
        );
        outgoing.extend(self.announce_requests(oracle, t)?);
        if !outgoing.is_empty() {
            self.plan.prepend(outgoing);
        }

        Ok(self.plan.get_next_actions(t))
    }

    /// Forward relayed messages; unreachable hops are retried next cycle
    fn schedule_relays(
        &mut self,
        relays: Vec<(Message, Vec<AgentId>)>,
        oracle: &dyn AccessOracle,
        t: f64,
    ) -> PlannerResult<Vec<AgentAction>> {
        let mut actions = Vec::new();
        let mut waiting = Vec::new();

        for (message, path) in self.pending_relays.drain(..).chain(relays) {
            match self
                .broadcasts
                .schedule_relay(message.clone(), path.clone(), oracle, t, self.horizon)?
            {
                Some(action) => actions.push(action),
                None => waiting.push((message, path)),
            }
        }

        self.pending_relays = waiting;
        Ok(actions)
    }

    /// Announce each self-generated request once
    fn announce_requests(&mut self, oracle: &dyn AccessOracle, t: f64) -> PlannerResult<Vec<AgentAction>> {
        let mut actions = Vec::new();
        let mut waiting = Vec::new();

        for req in std::mem::take(&mut self.pending_requests) {
            if self.announced.contains(&req.id) {
                continue;
            }
            let message = Message::MeasurementRequest(MeasurementRequestMessage {
                src: self.agent.clone(),
                req: req.clone(),
            });
            match self
                .broadcasts
                .schedule_broadcast(message, oracle, t, self.horizon)?
            {
                Some(action) => {
                    info!(agent = %self.agent, req = %req.id, "Announcing request");
                    self.announced.insert(req.id.clone());
                    actions.push(action);
                }
                None => {
                    warn!(agent = %self.agent, req = %req.id, "Request announcement deferred");
                    waiting.push(req);
                }
            }
        }

        self.pending_requests = waiting;
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyweave_core::{AccessRecord, ActionKind, TabulatedOracle, TimeInterval};
    use skyweave_feasibility::{AdcsSpec, InstrumentSpec, SatelliteState};

    fn specs() -> AgentSpecs {
        AgentSpecs {
            adcs: Some(AdcsSpec {
                max_rate: Some(1.0),
                max_torque: Some(1.0),
            }),
            instruments: vec![InstrumentSpec::rectangular("A", 5.0, 10.0)],
        }
    }

    fn state(t: f64) -> AgentState {
        AgentState::Satellite(SatelliteState {
            agent: "sat-1".to_string(),
            t,
            pos: [7000.0, 0.0, 0.0],
            vel: [0.0, 7.5, 0.0],
            attitude: [0.0, 0.0, 0.0],
            attitude_rates: [0.0; 3],
        })
    }

    fn request(id: &str) -> MeasurementRequest {
        MeasurementRequest::new(
            [1.0, 0.0, 0.0],
            100.0,
            vec!["A".to_string()],
            0.0,
            1000.0,
            0.0,
            10.0,
        )
        .unwrap()
        .with_id(id)
    }

    fn oracle() -> TabulatedOracle {
        let mut oracle = TabulatedOracle::new(1.0);
        oracle.add_contact("sat-1", "sat-2", TimeInterval::new(0.0, 2000.0));
        oracle.add_contact("sat-2", "sat-3", TimeInterval::new(0.0, 2000.0));
        oracle.add_access(AccessRecord {
            agent: "sat-1".to_string(),
            target: [1.0, 0.0, 0.0],
            instrument: "A".to_string(),
            t: 100.0,
            look_angle: 0.0,
        });
        oracle
    }

    fn broadcast_kinds(actions: &[AgentAction]) -> Vec<&'static str> {
        actions
            .iter()
            .filter_map(|action| match &action.kind {
                ActionKind::Broadcast { message, .. } => Some(message.kind()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_consensus_module_converges_to_plan() {
        let oracle = oracle();
        let mut module =
            PlanningModule::new("sat-1", &Config::default_config(), &specs()).unwrap();

        let actions = module
            .step(
                &state(0.0),
                Percepts {
                    incoming_requests: vec![request("R")],
                    ..Default::default()
                },
                &oracle,
            )
            .unwrap();
        assert!(broadcast_kinds(&actions).contains(&"measurement_bid"));
        assert!(module.plan().observations().is_empty());

        let completed: Vec<AgentAction> = actions.into_iter().filter(|a| a.is_broadcast()).collect();
        module
            .step(
                &state(1.0),
                Percepts {
                    completed_actions: completed,
                    ..Default::default()
                },
                &oracle,
            )
            .unwrap();

        assert_eq!(module.plan().observations().len(), 1);
        assert!(module.known_bids().iter().any(|bid| bid.is_won_by("sat-1")));
    }

    #[test]
    fn test_generated_request_announced_once() {
        let oracle = oracle();
        let mut module =
            PlanningModule::new("sat-1", &Config::default_config(), &specs()).unwrap();

        let percepts = Percepts {
            generated_requests: vec![request("G")],
            ..Default::default()
        };
        let actions = module.step(&state(0.0), percepts.clone(), &oracle).unwrap();
        let announced = broadcast_kinds(&actions)
            .into_iter()
            .filter(|kind| *kind == "measurement_request")
            .count();
        assert_eq!(announced, 1);

        let actions = module.step(&state(1.0), percepts, &oracle).unwrap();
        let announced = broadcast_kinds(&actions)
            .into_iter()
            .filter(|kind| *kind == "measurement_request")
            .count();
        // the first announcement is still pending in the plan, no second copy
        assert_eq!(announced, 1);
    }

    #[test]
    fn test_announcement_waits_for_isolated_agent() {
        let mut isolated = oracle();
        isolated.add_agent("sat-4");
        let mut module =
            PlanningModule::new("sat-1", &Config::default_config(), &specs()).unwrap();

        let percepts = Percepts {
            generated_requests: vec![request("G")],
            ..Default::default()
        };
        let actions = module.step(&state(0.0), percepts, &isolated).unwrap();
        assert!(!broadcast_kinds(&actions).contains(&"measurement_request"));
        assert_eq!(module.pending_requests.len(), 1);

        // sat-4 comes into contact, the deferred announcement goes out
        let mut connected = isolated.clone();
        connected.add_contact("sat-3", "sat-4", TimeInterval::new(0.0, 2000.0));
        let actions = module
            .step(&state(1.0), Percepts::default(), &connected)
            .unwrap();
        assert!(broadcast_kinds(&actions).contains(&"measurement_request"));
        assert!(module.pending_requests.is_empty());
    }

    #[test]
    fn test_unreachable_relay_kept_pending() {
        let mut oracle = oracle();
        oracle.add_agent("sat-4");
        let mut module =
            PlanningModule::new("sat-1", &Config::default_config(), &specs()).unwrap();

        let message = Message::MeasurementRequest(MeasurementRequestMessage {
            src: "sat-2".to_string(),
            req: request("X"),
        });
        let percepts = Percepts {
            relays: vec![
                (message.clone(), vec!["sat-2".to_string(), "sat-3".to_string()]),
                (message, vec!["sat-4".to_string()]),
            ],
            ..Default::default()
        };

        module.step(&state(0.0), percepts, &oracle).unwrap();
        assert_eq!(module.pending_relays.len(), 1);
        assert_eq!(module.pending_relays[0].1, vec!["sat-4".to_string()]);
    }

    #[test]
    fn test_preplanner_only_module() {
        let oracle = oracle();
        let mut config = Config::default_config();
        config.planner.preplanner = PreplannerKind::EarliestAccess;
        config.planner.replanner = ReplannerKind::None;
        let mut module = PlanningModule::new("sat-1", &config, &specs()).unwrap();

        module
            .step(
                &state(0.0),
                Percepts {
                    incoming_requests: vec![request("R")],
                    ..Default::default()
                },
                &oracle,
            )
            .unwrap();

        assert_eq!(module.plan().observations().len(), 1);
        assert!(module.known_bids().is_empty());
    }
}
