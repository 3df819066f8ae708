//! Broadcast scheduling and relay forwarding with deduplication.
//!
//! Outgoing messages are turned into broadcast actions timed by the relay router.
//! Incoming envelopes are deduplicated by their content-derived id; an agent named
//! at the head of an envelope's relay path forwards the rest of the path at its next
//! contact with the following hop.

use crate::error::{MeshError, MeshResult};
use crate::relay::RelayRouter;
use skyweave_core::{AccessOracle, AgentAction, AgentId, Envelope, Message};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Default maximum relay path length accepted
pub const DEFAULT_MAX_HOPS: usize = 32;

/// Outcome of processing an incoming envelope
#[derive(Debug, Clone, PartialEq)]
pub enum RelayResult {
    /// Message is new and addressed to this agent only
    Delivered(Message),
    /// Message is new and this agent must forward it along `path`
    Forward {
        /// Message to deliver locally and forward
        message: Message,
        /// Remaining relay hops
        path: Vec<AgentId>,
    },
    /// Message was already seen
    Duplicate,
    /// Envelope rejected
    Dropped(String),
}

/// Per-agent broadcast manager
#[derive(Debug)]
pub struct BroadcastScheduler {
    /// Local agent
    agent: AgentId,
    /// Relay router for outgoing broadcasts
    router: RelayRouter,
    /// Ids of messages already received or sent, with the time first seen
    seen_messages: HashMap<String, f64>,
    /// Longest relay path accepted
    max_hops: usize,
}

impl BroadcastScheduler {
    /// Create a broadcast manager for `agent`
    pub fn new(agent: impl Into<AgentId>) -> Self {
        let agent = agent.into();
        Self {
            router: RelayRouter::new(agent.clone()),
            agent,
            seen_messages: HashMap::new(),
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    /// Override the maximum relay path length
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Relay router used for outgoing broadcasts
    pub fn router(&self) -> &RelayRouter {
        &self.router
    }

    /// Whether a message id has been seen
    pub fn has_seen(&self, message_id: &str) -> bool {
        self.seen_messages.contains_key(message_id)
    }

    /// Schedule a broadcast of `message` to every other agent.
    ///
    /// Returns `None` when the message cannot be delivered within `horizon` of `t`;
    /// callers should try again on a later cycle.
    pub fn schedule_broadcast(
        &mut self,
        message: Message,
        oracle: &dyn AccessOracle,
        t: f64,
        horizon: f64,
    ) -> MeshResult<Option<AgentAction>> {
        let route = self.router.route_to_all(oracle, t);
        if !route.is_deliverable() || route.t_start > t + horizon {
            warn!(
                agent = %self.agent,
                kind = message.kind(),
                t_start = route.t_start,
                "Broadcast undeliverable this cycle"
            );
            return Ok(None);
        }

        self.seen_messages.entry(message.id()?).or_insert(t);
        Ok(Some(AgentAction::broadcast(message, route.path, route.t_start)))
    }

    /// Process an envelope received from the bus at time `t`
    pub fn process_envelope(&mut self, envelope: Envelope, t: f64) -> MeshResult<RelayResult> {
        // Check hop count
        if envelope.path.len() > self.max_hops {
            return Ok(RelayResult::Dropped("Max hops exceeded".to_string()));
        }

        // Check for duplicate
        if self.seen_messages.contains_key(&envelope.id) {
            return Ok(RelayResult::Duplicate);
        }

        // Content must match the advertised id
        if envelope.message.id()? != envelope.id {
            return Err(MeshError::InvalidRelay(format!(
                "envelope id {} does not match payload",
                envelope.id
            )));
        }

        self.seen_messages.insert(envelope.id.clone(), t);

        let mut path = envelope.path;
        if path.first().map(String::as_str) == Some(self.agent.as_str()) {
            path.remove(0);
            if !path.is_empty() {
                debug!(
                    agent = %self.agent,
                    next_hop = %path[0],
                    remaining = path.len(),
                    "Relaying message"
                );
                return Ok(RelayResult::Forward {
                    message: envelope.message,
                    path,
                });
            }
        }

        Ok(RelayResult::Delivered(envelope.message))
    }

    /// Schedule forwarding of a relayed message to the next hop in `path`.
    ///
    /// Returns `None` when the next hop is not reachable within `horizon` of `t`.
    pub fn schedule_relay(
        &self,
        message: Message,
        path: Vec<AgentId>,
        oracle: &dyn AccessOracle,
        t: f64,
        horizon: f64,
    ) -> MeshResult<Option<AgentAction>> {
        let next_hop = path
            .first()
            .ok_or_else(|| MeshError::InvalidRelay("relay path is empty".to_string()))?;

        let window = oracle.next_contact_window(&self.agent, next_hop, t);
        if !window.is_reachable() || window.start > t + horizon {
            warn!(agent = %self.agent, next_hop = %next_hop, "Relay hop unreachable this cycle");
            return Ok(None);
        }

        Ok(Some(AgentAction::broadcast(message, path, window.start)))
    }

    /// Forget ids first seen more than `max_age` before `t`
    pub fn prune_seen(&mut self, t: f64, max_age: f64) {
        let before = self.seen_messages.len();
        self.seen_messages.retain(|_, first_seen| *first_seen >= t - max_age);

        let pruned = before - self.seen_messages.len();
        if pruned > 0 {
            debug!(agent = %self.agent, pruned, remaining = self.seen_messages.len(), "Pruned seen messages");
        }
    }
}
