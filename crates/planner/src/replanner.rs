//! Consensus replanner.
//!
//! Every cycle merges the bids the agent heard into its bid table, then grows its
//! bundle with whatever it can still win. The active plan is only replaced once the
//! bundle survives a planning phase unchanged; until then the agent keeps its current
//! plan and only gossips its bids.

use std::collections::BTreeSet;
use std::sync::Arc;

use skyweave_consensus::{dedup_rebroadcasts, BundleBuilder, ConsensusEngine};
use skyweave_core::{
    AgentAction, AgentId, Bid, MeasurementBidMessage, MeasurementRequest, Message, Plan,
    PlannerConfig, TaskRef,
};
use skyweave_feasibility::FeasibilityScheduler;
use skyweave_mesh::BroadcastScheduler;
use tracing::{debug, info};

use crate::error::PlannerResult;
use crate::planner::{pending_broadcasts, Percepts, Planner, PlanningContext};

/// Consensus-based bundle replanner
pub struct ConsensusReplanner {
    agent: AgentId,
    engine: ConsensusEngine,
    builder: BundleBuilder,
    scheduler: Arc<FeasibilityScheduler>,
    broadcasts: BroadcastScheduler,
    horizon: f64,
    period: Option<f64>,
    /// Bids waiting to be sent
    rebroadcasts: Vec<Bid>,
    /// The bid table changed since the last planning phase
    dirty: bool,
    /// The last planning phase left the bundle unchanged
    converged: bool,
    /// Time of the last planning phase
    t_last: f64,
}

impl ConsensusReplanner {
    /// Create a replanner for `agent`
    pub fn new(agent: impl Into<AgentId>, scheduler: Arc<FeasibilityScheduler>, config: &PlannerConfig) -> Self {
        let agent = agent.into();
        Self {
            engine: ConsensusEngine::new(agent.clone()),
            broadcasts: BroadcastScheduler::new(agent.clone()),
            builder: BundleBuilder::from_config(config),
            agent,
            scheduler,
            horizon: config.horizon,
            period: config.replanner_period,
            rebroadcasts: Vec::new(),
            dirty: false,
            converged: false,
            t_last: f64::NEG_INFINITY,
        }
    }

    /// Consensus state
    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    /// Whether the last planning phase left the bundle unchanged
    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Wrap bids with the requests they refer to
    fn bid_message(&self, bids: Vec<Bid>) -> Message {
        let req_ids: BTreeSet<&str> = bids.iter().map(|bid| bid.req_id.as_str()).collect();
        let requests: Vec<MeasurementRequest> = req_ids
            .into_iter()
            .filter_map(|req_id| self.engine.table().request(req_id).cloned())
            .collect();

        Message::MeasurementBid(MeasurementBidMessage {
            src: self.agent.clone(),
            bids,
            requests,
        })
    }

    fn period_elapsed(&self, t: f64) -> bool {
        self.period.is_some_and(|period| t >= self.t_last + period)
    }
}

impl Planner for ConsensusReplanner {
    fn name(&self) -> &'static str {
        "consensus"
    }

    fn update_percepts(&mut self, ctx: &PlanningContext<'_>, percepts: &Percepts) {
        let t = ctx.t();

        let requests: Vec<MeasurementRequest> = percepts
            .requests()
            .into_iter()
            .filter(|req| req.s_max > 0.0)
            .collect();
        let outcome = self.engine.consensus_phase(&requests, &percepts.bids(), t);

        let mut performed: Vec<TaskRef> = percepts
            .own_observations()
            .into_iter()
            .map(|observation| observation.task())
            .collect();
        performed.extend(percepts.reported_observations());
        for task in &performed {
            if let Some(bid) = self.engine.mark_performed(task) {
                self.rebroadcasts.push(bid);
            }
        }

        if !outcome.changes.is_empty() || !outcome.rebroadcasts.is_empty() || !performed.is_empty() {
            self.dirty = true;
        }
        self.rebroadcasts.extend(outcome.rebroadcasts);

        debug!(
            agent = %self.agent,
            changes = outcome.changes.len(),
            pending = self.rebroadcasts.len(),
            bundle = self.engine.path().len(),
            "Consensus phase"
        );
    }

    fn needs_planning(&self, ctx: &PlanningContext<'_>) -> bool {
        !ctx.plan.is_initialized()
            || !self.rebroadcasts.is_empty()
            || self.dirty
            || !self.converged
            || self.period_elapsed(ctx.t())
    }

    fn generate_plan(&mut self, ctx: &PlanningContext<'_>) -> PlannerResult<Plan> {
        let t = ctx.t();
        let t_next = self.period.map_or(f64::INFINITY, |period| t + period);

        let before: BTreeSet<TaskRef> = self.engine.bundle().into_iter().collect();
        let changes = self.builder.planning_phase(
            &mut self.engine,
            ctx.state,
            &self.scheduler,
            ctx.oracle,
            t,
        );
        let after: BTreeSet<TaskRef> = self.engine.bundle().into_iter().collect();
        self.converged = before == after;
        self.dirty = false;
        self.t_last = t;

        let mut plan = if self.converged {
            let observations = self.engine.observations();
            let mut actions =
                self.scheduler
                    .schedule_maneuvers(ctx.state, &observations, ctx.clock, ctx.oracle)?;
            actions.extend(observations.iter().cloned().map(AgentAction::observation));
            actions.extend(pending_broadcasts(ctx.plan));

            info!(
                agent = %self.agent,
                bundle = after.len(),
                observations = observations.len(),
                "Bundle converged, plan replaced"
            );
            Plan::new(actions, t, t_next)
        } else if ctx.plan.is_initialized() {
            debug!(agent = %self.agent, bundle = after.len(), "Bundle not converged, keeping plan");
            ctx.plan.clone()
        } else {
            Plan::new(Vec::new(), t, t_next)
        };

        let mut outgoing = std::mem::take(&mut self.rebroadcasts);
        outgoing.extend(changes);
        // queued copies may predate later table updates; send the current record
        let outgoing: Vec<Bid> = dedup_rebroadcasts(outgoing)
            .into_iter()
            .map(|bid| {
                let task = bid.task();
                self.engine
                    .table()
                    .bid(&task)
                    .map_or(bid, |current| current.authored_by(&self.agent))
            })
            .collect();

        if !outgoing.is_empty() {
            let message = self.bid_message(outgoing.clone());
            match self
                .broadcasts
                .schedule_broadcast(message, ctx.oracle, t, self.horizon)?
            {
                Some(action) => plan.prepend(vec![action]),
                None => self.rebroadcasts = outgoing,
            }
        }

        Ok(plan)
    }

    fn known_bids(&self) -> Vec<Bid> {
        self.engine.table().bids().cloned().collect()
    }
}
