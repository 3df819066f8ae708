//! Async agent runtime.
//!
//! Each agent runs two tasks:
//! - a listener that deduplicates incoming envelopes, sorts them into the planner's
//!   inbox and publishes the latest agent state
//! - a planner that wakes on every state update, drains the inbox into a
//!   [`Percepts`] batch, steps the [`PlanningModule`] and emits the actions to start
//!
//! Either task ending cancels the other.

use std::sync::Arc;

use skyweave_core::{AccessOracle, ActionStatus, AgentAction, AgentId, Envelope, MeasurementRequest, Message};
use skyweave_feasibility::AgentState;
use skyweave_mesh::{BroadcastScheduler, RelayResult};
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PlannerError, PlannerResult};
use crate::module::PlanningModule;
use crate::planner::Percepts;

/// Default bound of the runtime channels
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// How long the listener remembers a message id after first seeing it [s]
const SEEN_MESSAGE_TTL: f64 = 86_400.0;

/// Input from the environment to one agent
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Latest agent state; triggers a planning cycle
    State(AgentState),
    /// Executor status report for a previously emitted action
    ActionStatus(AgentAction),
    /// Envelope received over the mesh
    Envelope(Envelope),
    /// Request generated by the agent's own sensors
    GeneratedRequest(MeasurementRequest),
    /// The simulation is over
    SimulationEnd,
}

/// Inbox entries handed from the listener to the planner
#[derive(Debug)]
enum Inbound {
    Status(AgentAction),
    Generated(MeasurementRequest),
    Message(Message),
    Relay(Message, Vec<AgentId>),
}

/// State shared between the listener and planner tasks
struct Shared {
    state: RwLock<Option<AgentState>>,
    state_updated: Notify,
}

/// Handle to a running agent
pub struct AgentHandle {
    agent: AgentId,
    events: mpsc::Sender<AgentEvent>,
    actions: mpsc::Receiver<Vec<AgentAction>>,
    cancel: CancellationToken,
    listener: JoinHandle<PlannerResult<()>>,
    planner: JoinHandle<PlannerResult<PlanningModule>>,
}

impl AgentHandle {
    /// Agent this handle drives
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Deliver an event to the agent
    pub async fn send(&self, event: AgentEvent) -> PlannerResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| PlannerError::ChannelClosed("events"))
    }

    /// Wait for the actions of the next planning cycle.
    ///
    /// Returns `None` once the agent has stopped.
    pub async fn next_actions(&mut self) -> Option<Vec<AgentAction>> {
        self.actions.recv().await
    }

    /// Token cancelled when the agent stops
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the agent without waiting for the end of the simulation
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for both tasks and return the final planning state
    pub async fn join(self) -> PlannerResult<PlanningModule> {
        drop(self.events);
        drop(self.actions);

        let listener = self
            .listener
            .await
            .map_err(|e| PlannerError::Task(e.to_string()))?;
        let module = self
            .planner
            .await
            .map_err(|e| PlannerError::Task(e.to_string()))??;
        listener?;
        Ok(module)
    }
}

/// Spawns agents onto the tokio runtime
pub struct AgentRuntime {
    inbox_capacity: usize,
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_INBOX_CAPACITY)
    }
}

impl AgentRuntime {
    /// Create a runtime whose channels hold up to `inbox_capacity` entries
    pub fn new(inbox_capacity: usize) -> Self {
        Self {
            inbox_capacity: inbox_capacity.max(1),
        }
    }

    /// Start the listener and planner tasks for `module`
    pub fn spawn(&self, module: PlanningModule, oracle: Arc<dyn AccessOracle>) -> AgentHandle {
        let agent: AgentId = module.agent().to_string();
        let (events_tx, events_rx) = mpsc::channel(self.inbox_capacity);
        let (inbox_tx, inbox_rx) = mpsc::channel(self.inbox_capacity);
        let (actions_tx, actions_rx) = mpsc::channel(self.inbox_capacity);
        let cancel = CancellationToken::new();
        let shared = Arc::new(Shared {
            state: RwLock::new(None),
            state_updated: Notify::new(),
        });

        let listener = tokio::spawn(listen(
            agent.clone(),
            events_rx,
            inbox_tx,
            Arc::clone(&shared),
            cancel.clone(),
        ));
        let planner = tokio::spawn(plan(
            module,
            oracle,
            inbox_rx,
            actions_tx,
            shared,
            cancel.clone(),
        ));

        info!(agent = %agent, "Agent started");

        AgentHandle {
            agent,
            events: events_tx,
            actions: actions_rx,
            cancel,
            listener,
            planner,
        }
    }
}

/// Listener task: sort events into the inbox and publish state updates
async fn listen(
    agent: AgentId,
    mut events: mpsc::Receiver<AgentEvent>,
    inbox: mpsc::Sender<Inbound>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) -> PlannerResult<()> {
    let _guard = cancel.clone().drop_guard();
    let mut broadcasts = BroadcastScheduler::new(agent.clone());
    let mut t_now = 0.0;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        let inbound = match event {
            None | Some(AgentEvent::SimulationEnd) => {
                info!(agent = %agent, "Simulation ended, stopping listener");
                break;
            }
            Some(AgentEvent::State(state)) => {
                t_now = state.t();
                broadcasts.prune_seen(t_now, SEEN_MESSAGE_TTL);
                *shared.state.write().await = Some(state);
                shared.state_updated.notify_one();
                continue;
            }
            Some(AgentEvent::ActionStatus(action)) => vec![Inbound::Status(action)],
            Some(AgentEvent::GeneratedRequest(req)) => vec![Inbound::Generated(req)],
            Some(AgentEvent::Envelope(envelope)) => {
                if envelope.message.src() == agent {
                    continue;
                }
                let from = envelope.sender.clone();
                let result = broadcasts.process_envelope(envelope, t_now);

                match result {
                    Ok(RelayResult::Delivered(message)) => vec![Inbound::Message(message)],
                    Ok(RelayResult::Forward { message, path }) => {
                        vec![Inbound::Message(message.clone()), Inbound::Relay(message, path)]
                    }
                    Ok(RelayResult::Duplicate) => continue,
                    Ok(RelayResult::Dropped(reason)) => {
                        warn!(agent = %agent, from = %from, reason = %reason, "Envelope dropped");
                        continue;
                    }
                    Err(e) => {
                        warn!(agent = %agent, from = %from, error = %e, "Invalid envelope");
                        continue;
                    }
                }
            }
        };

        for item in inbound {
            if inbox.send(item).await.is_err() {
                return Err(PlannerError::ChannelClosed("inbox"));
            }
        }
    }

    Ok(())
}

/// Planner task: one planning cycle per state update
async fn plan(
    mut module: PlanningModule,
    oracle: Arc<dyn AccessOracle>,
    mut inbox: mpsc::Receiver<Inbound>,
    actions: mpsc::Sender<Vec<AgentAction>>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) -> PlannerResult<PlanningModule> {
    let _guard = cancel.clone().drop_guard();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.state_updated.notified() => {}
        }

        let state = shared.state.read().await.clone();
        let Some(state) = state else {
            continue;
        };

        let mut percepts = Percepts::default();
        while let Ok(item) = inbox.try_recv() {
            absorb(&mut percepts, item);
        }

        let next = module.step(&state, percepts, oracle.as_ref())?;
        debug!(agent = %module.agent(), t = state.t(), actions = next.len(), "Planning cycle");

        if actions.send(next).await.is_err() {
            debug!(agent = %module.agent(), "Action receiver dropped");
            break;
        }
    }

    info!(
        agent = %module.agent(),
        remaining = module.plan().len(),
        "Planner stopped"
    );
    Ok(module)
}

fn absorb(percepts: &mut Percepts, item: Inbound) {
    match item {
        Inbound::Status(action) => match action.status {
            ActionStatus::Completed => percepts.completed_actions.push(action),
            ActionStatus::Aborted => percepts.aborted_actions.push(action),
            ActionStatus::Pending => {}
        },
        Inbound::Generated(req) => percepts.generated_requests.push(req),
        Inbound::Message(message) => percepts.messages.push(message),
        Inbound::Relay(message, path) => percepts.relays.push((message, path)),
    }
}
