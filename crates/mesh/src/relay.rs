//! Relay Routing - minimum-delay broadcast paths over a time-varying contact graph
//!
//! Agents only talk while in contact. To reach every other agent a broadcast may need
//! to be carried by intermediate agents, each forwarding at its next contact window.
//! The router searches all relay orders and keeps the one that finishes earliest.

use serde::{Deserialize, Serialize};
use skyweave_core::{AccessOracle, AgentId, TIME_EPSILON};
use std::collections::VecDeque;
use tracing::debug;

/// Result of a relay search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRoute {
    /// Relay order; empty when no relaying is needed
    pub path: Vec<AgentId>,
    /// When the sender should transmit [s]; infinite when undeliverable
    pub t_start: f64,
}

impl RelayRoute {
    /// Direct broadcast at `t_start`
    pub fn direct(t_start: f64) -> Self {
        Self {
            path: Vec::new(),
            t_start,
        }
    }

    /// No complete path exists
    pub fn undeliverable() -> Self {
        Self {
            path: Vec::new(),
            t_start: f64::INFINITY,
        }
    }

    /// Whether the broadcast can be sent at all
    pub fn is_deliverable(&self) -> bool {
        self.t_start.is_finite()
    }
}

/// Partial relay path in the search queue
#[derive(Debug, Clone)]
struct SearchNode {
    /// Agent holding the message
    holder: AgentId,
    /// Agents reached so far, in order
    visited: Vec<AgentId>,
    /// Time each visited agent is reached
    times: Vec<f64>,
    /// Delay since the query time
    cost: f64,
}

/// Relay router for one sending agent
#[derive(Debug, Clone)]
pub struct RelayRouter {
    /// Sending agent
    agent: AgentId,
}

impl RelayRouter {
    /// Create a router for `agent`
    pub fn new(agent: impl Into<AgentId>) -> Self {
        Self {
            agent: agent.into(),
        }
    }

    /// Sending agent
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Route a broadcast to every other agent known to the oracle
    pub fn route_to_all(&self, oracle: &dyn AccessOracle, t0: f64) -> RelayRoute {
        let targets: Vec<AgentId> = oracle
            .agents()
            .into_iter()
            .filter(|agent| *agent != self.agent)
            .collect();
        self.route(&targets, oracle, t0)
    }

    /// Find the relay path that reaches every target soonest after `t0`.
    ///
    /// Returns [`RelayRoute::undeliverable`] when no complete path exists.
    pub fn route(&self, targets: &[AgentId], oracle: &dyn AccessOracle, t0: f64) -> RelayRoute {
        let targets: Vec<&AgentId> = targets.iter().filter(|t| **t != self.agent).collect();
        if targets.is_empty() {
            return RelayRoute::direct(t0);
        }

        // Everyone reachable in the same window: no relay needed
        let first_windows: Vec<_> = targets
            .iter()
            .map(|target| oracle.next_contact_window(&self.agent, target, t0))
            .collect();
        let reference = first_windows[0];
        let simultaneous = reference.is_reachable()
            && first_windows.iter().all(|window| {
                (window.start - reference.start).abs() < TIME_EPSILON
                    && (window.end - reference.end).abs() < TIME_EPSILON
            });
        if simultaneous {
            return RelayRoute::direct(reference.start.max(t0));
        }

        let mut queue = VecDeque::new();
        queue.push_back(SearchNode {
            holder: self.agent.clone(),
            visited: Vec::new(),
            times: Vec::new(),
            cost: 0.0,
        });

        let mut best: Option<SearchNode> = None;
        let mut min_cost = f64::INFINITY;
        let mut expanded = 0usize;

        while let Some(node) = queue.pop_front() {
            expanded += 1;

            // Check for a complete path
            if node.visited.len() == targets.len() {
                if node.cost < min_cost {
                    min_cost = node.cost;
                    best = Some(node);
                }
                continue;
            }

            for candidate in &targets {
                if node.visited.contains(candidate) {
                    continue;
                }

                let window = oracle.next_contact_window(&node.holder, candidate, t0 + node.cost);
                if !window.is_reachable() {
                    continue;
                }

                let t_reached = window.start.max(t0 + node.cost);
                let cost = t_reached - t0;
                // Bound: cost never decreases along a path
                if cost >= min_cost {
                    continue;
                }

                let mut visited = node.visited.clone();
                visited.push((*candidate).clone());
                let mut times = node.times.clone();
                times.push(t_reached);

                queue.push_back(SearchNode {
                    holder: (*candidate).clone(),
                    visited,
                    times,
                    cost,
                });
            }
        }

        debug!(
            agent = %self.agent,
            targets = targets.len(),
            expanded,
            cost = min_cost,
            "Relay search finished"
        );

        match best {
            Some(node) => RelayRoute {
                t_start: node.times.first().copied().unwrap_or(t0),
                path: node.visited,
            },
            None => RelayRoute::undeliverable(),
        }
    }
}
