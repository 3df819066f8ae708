//! Earliest-access preplanner.
//!
//! Builds a full plan at a fixed cadence: every known subtask the agent can perform is
//! taken at its earliest access inside the horizon, in time order, as long as the
//! sequence stays slew-feasible. The plan is announced to the fleet, and each
//! observation is reported once its imaging window closes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use skyweave_core::{
    AgentAction, AgentId, Message, MeasurementRequest, ObservationAction,
    ObservationPerformedMessage, Plan, PlanMessage, PlannerConfig, TaskRef, UtilityFunction,
};
use skyweave_feasibility::FeasibilityScheduler;
use skyweave_mesh::BroadcastScheduler;
use tracing::{debug, info};

use crate::error::PlannerResult;
use crate::planner::{pending_broadcasts, Percepts, Planner, PlanningContext};

/// Periodic earliest-access planner
pub struct EarliestAccessPlanner {
    agent: AgentId,
    scheduler: Arc<FeasibilityScheduler>,
    broadcasts: BroadcastScheduler,
    horizon: f64,
    period: Option<f64>,
    utility: UtilityFunction,
    known_requests: BTreeMap<String, MeasurementRequest>,
    performed: HashSet<TaskRef>,
}

impl EarliestAccessPlanner {
    /// Create a preplanner for `agent`
    pub fn new(agent: impl Into<AgentId>, scheduler: Arc<FeasibilityScheduler>, config: &PlannerConfig) -> Self {
        let agent = agent.into();
        Self {
            broadcasts: BroadcastScheduler::new(agent.clone()),
            agent,
            scheduler,
            horizon: config.horizon,
            period: config.preplanner_period,
            utility: config.utility,
            known_requests: BTreeMap::new(),
            performed: HashSet::new(),
        }
    }

    /// Earliest feasible observation per available subtask, greedily filtered
    fn schedule_observations(&self, ctx: &PlanningContext<'_>) -> Vec<ObservationAction> {
        let t = ctx.t();
        let mut candidates = Vec::new();

        for req in self.known_requests.values() {
            if req.is_expired(t) {
                continue;
            }

            let t_start = t.max(req.t_start);
            let t_end = req.latest_start().min(t + self.horizon);
            if t_start > t_end {
                continue;
            }

            for (index, group) in req.measurement_groups.iter().enumerate() {
                let task = TaskRef::new(req.id.clone(), index);
                if self.performed.contains(&task) || !self.scheduler.supports(&group.main) {
                    continue;
                }

                let earliest = ctx
                    .oracle
                    .arrival_times(&self.agent, &req.target, &group.main, t_start, t_end)
                    .into_iter()
                    .filter(|point| point.t.is_finite() && point.look_angle.is_finite())
                    .min_by(|a, b| a.t.total_cmp(&b.t));

                if let Some(point) = earliest {
                    candidates.push(ObservationAction {
                        req_id: req.id.clone(),
                        subtask_index: index,
                        instrument: group.main.clone(),
                        target: req.target,
                        look_angle: point.look_angle,
                        utility: self.utility.subtask_utility(req, index, point.t),
                        t_start: point.t,
                        t_end: point.t + req.duration,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            a.t_start
                .total_cmp(&b.t_start)
                .then_with(|| b.utility.total_cmp(&a.utility))
                .then_with(|| a.task().cmp(&b.task()))
        });

        let mut path: Vec<ObservationAction> = Vec::new();
        for candidate in candidates {
            let excluded = self
                .known_requests
                .get(&candidate.req_id)
                .is_some_and(|req| {
                    path.iter().any(|planned| {
                        planned.req_id == candidate.req_id
                            && req.is_mutually_exclusive(planned.subtask_index, candidate.subtask_index)
                    })
                });
            if excluded {
                continue;
            }

            path.push(candidate);
            if !self.scheduler.is_path_valid(ctx.state, &path) {
                path.pop();
            }
        }

        path
    }
}

impl Planner for EarliestAccessPlanner {
    fn name(&self) -> &'static str {
        "earliest_access"
    }

    fn update_percepts(&mut self, _ctx: &PlanningContext<'_>, percepts: &Percepts) {
        for req in percepts.requests() {
            if req.s_max > 0.0 && !self.known_requests.contains_key(&req.id) {
                self.known_requests.insert(req.id.clone(), req);
            }
        }

        self.performed
            .extend(percepts.own_observations().into_iter().map(ObservationAction::task));
        self.performed.extend(percepts.reported_observations());
    }

    fn needs_planning(&self, ctx: &PlanningContext<'_>) -> bool {
        !ctx.plan.is_initialized() || ctx.t() >= ctx.plan.t_next
    }

    fn generate_plan(&mut self, ctx: &PlanningContext<'_>) -> PlannerResult<Plan> {
        let t = ctx.t();
        let t_next = self.period.map_or(f64::INFINITY, |period| t + period);

        let observations = self.schedule_observations(ctx);
        let mut actions = self
            .scheduler
            .schedule_maneuvers(ctx.state, &observations, ctx.clock, ctx.oracle)?;
        actions.extend(observations.iter().cloned().map(AgentAction::observation));

        let announcement = Message::Plan(PlanMessage {
            src: self.agent.clone(),
            observations: observations.clone(),
            t_plan: t,
        });
        if let Some(action) = self
            .broadcasts
            .schedule_broadcast(announcement, ctx.oracle, t, self.horizon)?
        {
            actions.push(action);
        }

        for observation in &observations {
            let report = Message::ObservationPerformed(ObservationPerformedMessage {
                src: self.agent.clone(),
                observation: observation.clone(),
            });
            if let Some(action) = self.broadcasts.schedule_broadcast(
                report,
                ctx.oracle,
                observation.t_end,
                self.horizon,
            )? {
                actions.push(action);
            }
        }

        actions.extend(pending_broadcasts(ctx.plan));

        if t_next.is_finite() {
            let t_last = actions.iter().map(|action| action.t_end).fold(t, f64::max);
            if t_last < t_next {
                actions.push(AgentAction::wait_for_messages(t_last, t_next));
            }
        }

        info!(
            agent = %self.agent,
            observations = observations.len(),
            actions = actions.len(),
            t_next,
            "Preplanned"
        );
        debug!(agent = %self.agent, known_requests = self.known_requests.len(), "Preplanner state");

        Ok(Plan::new(actions, t, t_next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyweave_core::{AccessRecord, ActionKind, ClockConfig, Config, TabulatedOracle, TimeInterval};
    use skyweave_feasibility::{AdcsSpec, AgentSpecs, AgentState, InstrumentSpec, SatelliteState};

    fn scheduler() -> Arc<FeasibilityScheduler> {
        Arc::new(
            FeasibilityScheduler::new(&AgentSpecs {
                adcs: Some(AdcsSpec {
                    max_rate: Some(1.0),
                    max_torque: Some(1.0),
                }),
                instruments: vec![InstrumentSpec::rectangular("A", 5.0, 10.0)],
            })
            .unwrap(),
        )
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

    fn request(id: &str, lat: f64) -> MeasurementRequest {
        MeasurementRequest::new(
            [lat, 0.0, 0.0],
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

    fn oracle(accesses: &[(&MeasurementRequest, f64, f64)]) -> TabulatedOracle {
        let mut oracle = TabulatedOracle::new(1.0);
        oracle.add_contact("sat-1", "sat-2", TimeInterval::new(0.0, 2000.0));
        for (req, t, look_angle) in accesses {
            oracle.add_access(AccessRecord {
                agent: "sat-1".to_string(),
                target: req.target,
                instrument: "A".to_string(),
                t: *t,
                look_angle: *look_angle,
            });
        }
        oracle
    }

    fn config(period: Option<f64>) -> PlannerConfig {
        let mut config = Config::default_config().planner;
        config.preplanner_period = period;
        config
    }

    fn percepts(requests: Vec<MeasurementRequest>) -> Percepts {
        Percepts {
            incoming_requests: requests,
            ..Default::default()
        }
    }

    #[test]
    fn test_plans_earliest_accesses_in_order() {
        let r = request("R", 1.0);
        let s = request("S", 2.0);
        let oracle = oracle(&[(&r, 300.0, 20.0), (&r, 500.0, 0.0), (&s, 100.0, 0.0)]);
        let mut planner = EarliestAccessPlanner::new("sat-1", scheduler(), &config(None));

        let state = state(0.0);
        let plan = Plan::empty();
        let ctx = PlanningContext::new(&state, &plan, &oracle, &ClockConfig::EventDriven);
        planner.update_percepts(&ctx, &percepts(vec![r, s]));
        assert!(planner.needs_planning(&ctx));

        let plan = planner.generate_plan(&ctx).unwrap();
        let observations = plan.observations();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].req_id, "S");
        assert_eq!(observations[1].req_id, "R");
        assert_eq!(observations[1].t_start, 300.0);

        // announcement plus one report per observation
        let broadcasts = plan.actions.iter().filter(|a| a.is_broadcast()).count();
        assert_eq!(broadcasts, 3);
        assert!(plan
            .actions
            .iter()
            .any(|a| matches!(a.kind, ActionKind::Maneuver { .. })));
        assert!(plan.t_next.is_infinite());
    }

    #[test]
    fn test_drops_infeasible_slew() {
        let r = request("R", 1.0);
        let s = request("S", 2.0);
        // 40 degree swing needs 40 s but only 5 s are free after R
        let oracle = oracle(&[(&r, 100.0, 0.0), (&s, 115.0, 40.0)]);
        let mut planner = EarliestAccessPlanner::new("sat-1", scheduler(), &config(None));

        let state = state(0.0);
        let plan = Plan::empty();
        let ctx = PlanningContext::new(&state, &plan, &oracle, &ClockConfig::EventDriven);
        planner.update_percepts(&ctx, &percepts(vec![r, s]));

        let plan = planner.generate_plan(&ctx).unwrap();
        let observations = plan.observations();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].req_id, "R");
    }

    #[test]
    fn test_skips_performed_subtasks() {
        let r = request("R", 1.0);
        let oracle = oracle(&[(&r, 100.0, 0.0)]);
        let mut planner = EarliestAccessPlanner::new("sat-1", scheduler(), &config(None));

        let state = state(0.0);
        let plan = Plan::empty();
        let ctx = PlanningContext::new(&state, &plan, &oracle, &ClockConfig::EventDriven);
        let mut seen = percepts(vec![r]);
        seen.messages.push(Message::ObservationPerformed(ObservationPerformedMessage {
            src: "sat-2".to_string(),
            observation: ObservationAction {
                req_id: "R".to_string(),
                subtask_index: 0,
                instrument: "A".to_string(),
                target: [1.0, 0.0, 0.0],
                look_angle: 0.0,
                utility: 100.0,
                t_start: 50.0,
                t_end: 60.0,
            },
        }));
        planner.update_percepts(&ctx, &seen);

        let plan = planner.generate_plan(&ctx).unwrap();
        assert!(plan.observations().is_empty());
    }

    #[test]
    fn test_periodic_plan_waits_for_next_period() {
        let r = request("R", 1.0);
        let oracle = oracle(&[(&r, 100.0, 0.0)]);
        let mut planner = EarliestAccessPlanner::new("sat-1", scheduler(), &config(Some(600.0)));

        let state_0 = state(0.0);
        let empty = Plan::empty();
        let ctx = PlanningContext::new(&state_0, &empty, &oracle, &ClockConfig::EventDriven);
        planner.update_percepts(&ctx, &percepts(vec![r]));
        let plan = planner.generate_plan(&ctx).unwrap();

        assert_eq!(plan.t_next, 600.0);
        let wait = plan.actions.last().unwrap();
        assert_eq!(wait.name(), "wait");
        assert_eq!(wait.t_end, 600.0);

        let state_1 = state(300.0);
        let ctx = PlanningContext::new(&state_1, &plan, &oracle, &ClockConfig::EventDriven);
        assert!(!planner.needs_planning(&ctx));

        let state_2 = state(600.0);
        let ctx = PlanningContext::new(&state_2, &plan, &oracle, &ClockConfig::EventDriven);
        assert!(planner.needs_planning(&ctx));
    }
}
