//! Planner interface shared by the preplanner and the replanner.
//!
//! A planner is fed everything the agent perceived since the last cycle, decides
//! whether its plan is stale and, if so, builds a new one. Feasibility and broadcast
//! scheduling are values the planners hold, not behavior they inherit.

use skyweave_core::{
    AccessOracle, ActionKind, AgentAction, AgentId, Bid, ClockConfig, MeasurementRequest, Message,
    ObservationAction, Plan, TaskRef,
};
use skyweave_feasibility::AgentState;

use crate::error::PlannerResult;

/// What the agent perceived since the previous planning cycle
#[derive(Debug, Clone, Default)]
pub struct Percepts {
    /// Actions the executor finished
    pub completed_actions: Vec<AgentAction>,
    /// Actions the executor gave up on
    pub aborted_actions: Vec<AgentAction>,
    /// Requests received from other agents
    pub incoming_requests: Vec<MeasurementRequest>,
    /// Requests generated by this agent
    pub generated_requests: Vec<MeasurementRequest>,
    /// Messages this agent must forward, with the hops still to go
    pub relays: Vec<(Message, Vec<AgentId>)>,
    /// Every other message received
    pub messages: Vec<Message>,
}

impl Percepts {
    /// Whether nothing was perceived
    pub fn is_empty(&self) -> bool {
        self.completed_actions.is_empty()
            && self.aborted_actions.is_empty()
            && self.incoming_requests.is_empty()
            && self.generated_requests.is_empty()
            && self.relays.is_empty()
            && self.messages.is_empty()
    }

    /// All requests perceived: incoming, generated, and those carried by bid messages
    pub fn requests(&self) -> Vec<MeasurementRequest> {
        let mut requests: Vec<MeasurementRequest> = self
            .incoming_requests
            .iter()
            .chain(self.generated_requests.iter())
            .cloned()
            .collect();

        for message in &self.messages {
            match message {
                Message::MeasurementRequest(msg) => requests.push(msg.req.clone()),
                Message::MeasurementBid(msg) => requests.extend(msg.requests.iter().cloned()),
                _ => {}
            }
        }
        requests
    }

    /// Bids carried by received bid messages
    pub fn bids(&self) -> Vec<Bid> {
        self.messages
            .iter()
            .filter_map(|message| match message {
                Message::MeasurementBid(msg) => Some(msg.bids.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Observations this agent finished
    pub fn own_observations(&self) -> Vec<&ObservationAction> {
        self.completed_actions
            .iter()
            .filter_map(|action| action.as_observation())
            .collect()
    }

    /// Subtasks other agents reported as observed
    pub fn reported_observations(&self) -> Vec<TaskRef> {
        self.messages
            .iter()
            .filter_map(|message| match message {
                Message::ObservationPerformed(msg) => Some(msg.observation.task()),
                _ => None,
            })
            .collect()
    }
}

/// Read-only view of the agent handed to planners
pub struct PlanningContext<'a> {
    /// Current agent state
    pub state: &'a AgentState,
    /// Active plan
    pub plan: &'a Plan,
    /// Visibility and contact data
    pub oracle: &'a dyn AccessOracle,
    /// Simulation clock
    pub clock: &'a ClockConfig,
}

impl<'a> PlanningContext<'a> {
    /// Bundle the planning inputs
    pub fn new(
        state: &'a AgentState,
        plan: &'a Plan,
        oracle: &'a dyn AccessOracle,
        clock: &'a ClockConfig,
    ) -> Self {
        Self {
            state,
            plan,
            oracle,
            clock,
        }
    }

    /// Current time [s]
    pub fn t(&self) -> f64 {
        self.state.t()
    }
}

/// A planning strategy
pub trait Planner: Send {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Absorb what the agent perceived since the last cycle
    fn update_percepts(&mut self, ctx: &PlanningContext<'_>, percepts: &Percepts);

    /// Whether the active plan should be replaced
    fn needs_planning(&self, ctx: &PlanningContext<'_>) -> bool;

    /// Build the next plan
    fn generate_plan(&mut self, ctx: &PlanningContext<'_>) -> PlannerResult<Plan>;

    /// Bids this planner currently knows of
    fn known_bids(&self) -> Vec<Bid> {
        Vec::new()
    }
}

/// Broadcasts of a plan that have not been sent yet
pub fn pending_broadcasts(plan: &Plan) -> Vec<AgentAction> {
    plan.actions
        .iter()
        .filter(|action| matches!(action.kind, ActionKind::Broadcast { .. }))
        .cloned()
        .collect()
}
