//! Consensus engine - reconciles the local bid table with foreign bids.
//!
//! The engine owns the agent's bid table and its path: the subtasks it has claimed, in
//! execution order, with realized imaging times. The bundle is the set of subtasks on
//! the path. A consensus phase runs three checks in a fixed order:
//!
//! 1. compare: merge foreign bids; losing a bundled subtask drops it and everything
//!    planned after it
//! 2. expire: drop bundled subtasks whose request can no longer start in time
//! 3. complete: remove performed subtasks; a performed exclusive alternative drops the
//!    subtask and everything after it
//!
//! Dropped entries the agent was winning are reset to blank and queued for rebroadcast.

use crate::compare::merge_bid;
use crate::results::BidTable;
use serde::{Deserialize, Serialize};
use skyweave_core::{AgentId, Bid, MeasurementRequest, ObservationAction, TaskRef};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One timed entry of an agent's path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathElement {
    /// Subtask performed
    pub task: TaskRef,
    /// Main instrument of the subtask
    pub instrument: String,
    /// Look angle at imaging time [deg]
    pub look_angle: f64,
    /// Imaging time [s]
    pub t_img: f64,
    /// Utility earned by the observation
    pub utility: f64,
}

impl PathElement {
    /// Observation action realizing this entry
    pub fn to_observation(&self, req: &MeasurementRequest) -> ObservationAction {
        ObservationAction {
            req_id: self.task.req_id.clone(),
            subtask_index: self.task.subtask_index,
            instrument: self.instrument.clone(),
            target: req.target,
            look_angle: self.look_angle,
            utility: self.utility,
            t_start: self.t_img,
            t_end: self.t_img + req.duration,
        }
    }
}

/// Bids produced by a consensus phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseOutcome {
    /// Local records that changed
    pub changes: Vec<Bid>,
    /// Local records to send to other agents
    pub rebroadcasts: Vec<Bid>,
}

impl PhaseOutcome {
    fn append(&mut self, mut other: PhaseOutcome) {
        self.changes.append(&mut other.changes);
        self.rebroadcasts.append(&mut other.rebroadcasts);
    }
}

/// Per-agent consensus state
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    agent: AgentId,
    table: BidTable,
    path: Vec<PathElement>,
}

impl ConsensusEngine {
    /// Create an engine with an empty bid table
    pub fn new(agent: impl Into<AgentId>) -> Self {
        Self {
            agent: agent.into(),
            table: BidTable::new(),
            path: Vec::new(),
        }
    }

    /// Local agent
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Local bid table
    pub fn table(&self) -> &BidTable {
        &self.table
    }

    /// Claimed subtasks in execution order
    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    /// Claimed subtasks
    pub fn bundle(&self) -> Vec<TaskRef> {
        self.path.iter().map(|element| element.task.clone()).collect()
    }

    /// Whether `task` is in the bundle
    pub fn in_bundle(&self, task: &TaskRef) -> bool {
        self.path_index(task).is_some()
    }

    /// Observations realizing the current path
    pub fn observations(&self) -> Vec<ObservationAction> {
        self.path
            .iter()
            .filter_map(|element| {
                let req = self.table.request(&element.task.req_id)?;
                Some(element.to_observation(req))
            })
            .collect()
    }

    /// Start tracking a request. Returns its blank bids if it was unknown.
    pub fn register_request(&mut self, req: &MeasurementRequest) -> Vec<Bid> {
        match self.table.insert_request(req, &self.agent) {
            Some(blanks) => {
                debug!(agent = %self.agent, req = %req, subtasks = blanks.len(), "Registered request");
                blanks
            }
            None => Vec::new(),
        }
    }

    /// Run compare, expire and complete over a batch of foreign bids
    pub fn consensus_phase(
        &mut self,
        requests: &[MeasurementRequest],
        bids: &[Bid],
        t: f64,
    ) -> PhaseOutcome {
        let mut outcome = self.compare_results(requests, bids, t);
        outcome.append(self.check_request_end_time(t));
        outcome.append(self.check_request_completion(t));
        outcome
    }

    fn compare_results(&mut self, requests: &[MeasurementRequest], bids: &[Bid], t: f64) -> PhaseOutcome {
        let mut outcome = PhaseOutcome::default();

        for req in requests {
            outcome.rebroadcasts.extend(self.register_request(req));
        }

        for theirs in bids {
            if theirs.bidder == self.agent {
                continue;
            }

            let task = theirs.task();
            let Some(local) = self.table.bid_mut(&task) else {
                debug!(agent = %self.agent, task = %task, "Ignoring bid for unknown request");
                continue;
            };

            let merge = merge_bid(local, theirs, &self.agent);
            debug!(
                agent = %self.agent,
                task = %task,
                from = %theirs.bidder,
                changed = merge.changed,
                rebroadcast = merge.rebroadcast,
                "Merged bid"
            );
            if merge.changed {
                outcome.changes.push(local.clone());
            }
            if merge.rebroadcast {
                outcome.rebroadcasts.push(local.authored_by(&self.agent));
            }

            let release = (!local.is_won_by(&self.agent)).then(|| {
                let mut notice = local.clone();
                notice.reset(&self.agent, t);
                notice
            });

            if let (Some(notice), Some(index)) = (release, self.path_index(&task)) {
                info!(
                    agent = %self.agent,
                    task = %task,
                    winner = theirs.winner.as_deref().unwrap_or("NONE"),
                    dropped = self.path.len() - index,
                    "Outbid on bundled task"
                );
                outcome.rebroadcasts.push(notice);
                outcome.rebroadcasts.extend(self.drop_from(index, t, false));
            }
        }

        outcome
    }

    fn check_request_end_time(&mut self, t: f64) -> PhaseOutcome {
        let mut outcome = PhaseOutcome::default();

        let expired = self.path.iter().position(|element| {
            self.table
                .request(&element.task.req_id)
                .is_some_and(|req| req.is_expired(t))
        });

        if let Some(index) = expired {
            info!(
                agent = %self.agent,
                task = %self.path[index].task,
                dropped = self.path.len() - index,
                "Bundled task expired"
            );
            outcome.rebroadcasts = self.drop_from(index, t, false);
        }

        outcome
    }

    fn check_request_completion(&mut self, t: f64) -> PhaseOutcome {
        let mut outcome = PhaseOutcome::default();

        while let Some((index, self_completed)) = self.find_completed(t) {
            if self_completed {
                let element = self.path.remove(index);
                if let Some(bid) = self.table.bid_mut(&element.task) {
                    if !bid.performed {
                        bid.performed = true;
                        outcome.changes.push(bid.clone());
                    }
                }
                debug!(agent = %self.agent, task = %element.task, "Bundled task completed");
            } else {
                info!(
                    agent = %self.agent,
                    task = %self.path[index].task,
                    dropped = self.path.len() - index,
                    "Exclusive alternative completed"
                );
                outcome.rebroadcasts.extend(self.drop_from(index, t, true));
            }
        }

        outcome
    }

    /// First path entry that is done, and whether it completed itself
    fn find_completed(&self, t: f64) -> Option<(usize, bool)> {
        self.path.iter().enumerate().find_map(|(index, element)| {
            let (req, bid) = self.table.get(&element.task)?;
            if bid.is_completed(t, req.duration) {
                return Some((index, true));
            }

            let subtask = element.task.subtask_index;
            let alternative_done = (0..req.subtask_count()).any(|other| {
                req.is_mutually_exclusive(subtask, other)
                    && self
                        .table
                        .bid(&TaskRef::new(req.id.clone(), other))
                        .is_some_and(|sibling| sibling.is_completed(t, req.duration))
            });
            alternative_done.then_some((index, false))
        })
    }

    /// Drop the path entry at `index` and every entry after it.
    ///
    /// Dropped entries still won by the local agent are reset. Returns the records to
    /// rebroadcast: the reset ones, or every dropped one when `rebroadcast_all` is set.
    fn drop_from(&mut self, index: usize, t: f64, rebroadcast_all: bool) -> Vec<Bid> {
        let dropped = self.path.split_off(index);
        let mut rebroadcasts = Vec::new();

        for element in dropped {
            let Some(bid) = self.table.bid_mut(&element.task) else {
                continue;
            };
            if bid.is_won_by(&self.agent) {
                bid.reset(&self.agent, t);
                rebroadcasts.push(bid.clone());
            } else if rebroadcast_all {
                rebroadcasts.push(bid.authored_by(&self.agent));
            }
        }

        rebroadcasts
    }

    fn path_index(&self, task: &TaskRef) -> Option<usize> {
        self.path.iter().position(|element| &element.task == task)
    }

    /// Replace the path and claim every entry whose bid differs from it.
    ///
    /// Returns the claimed bids.
    pub fn commit_path(&mut self, mut path: Vec<PathElement>, t: f64) -> Vec<Bid> {
        path.retain(|element| self.table.bid(&element.task).is_some());

        let mut changes = Vec::new();
        for element in &path {
            let Some(bid) = self.table.bid_mut(&element.task) else {
                continue;
            };
            let unchanged = bid.is_won_by(&self.agent)
                && bid.winning_bid == element.utility
                && bid.t_img == Some(element.t_img);
            if !unchanged {
                bid.claim(&self.agent, element.utility, element.t_img, t);
                changes.push(bid.clone());
            }
        }

        if path.len() != self.path.len() {
            info!(
                agent = %self.agent,
                bundle = path.len(),
                claimed = changes.len(),
                "Bundle updated"
            );
        }
        self.path = path;
        changes
    }

    /// Record that a subtask was observed.
    ///
    /// Removes it from the path. Returns the updated bid if the flag changed.
    pub fn mark_performed(&mut self, task: &TaskRef) -> Option<Bid> {
        if let Some(index) = self.path_index(task) {
            self.path.remove(index);
        }

        let bid = self.table.bid_mut(task)?;
        if bid.performed {
            return None;
        }
        bid.performed = true;
        Some(bid.authored_by(&self.agent))
    }
}

/// Keep one record per subtask.
///
/// Between copies from different bidders, the copy sent by the agent holding the
/// subtask wins. Otherwise the most recent copy wins, later entries winning ties.
pub fn dedup_rebroadcasts(bids: Vec<Bid>) -> Vec<Bid> {
    let mut kept: BTreeMap<TaskRef, Bid> = BTreeMap::new();
    for bid in bids {
        match kept.get(&bid.task()) {
            Some(current) if !supersedes(&bid, current) => {}
            _ => {
                kept.insert(bid.task(), bid);
            }
        }
    }
    kept.into_values().collect()
}

fn supersedes(candidate: &Bid, current: &Bid) -> bool {
    if candidate.bidder != current.bidder {
        let from_holder = |bid: &Bid, other: &Bid| {
            bid.is_won_by(&bid.bidder) || other.is_won_by(&bid.bidder)
        };
        match (from_holder(candidate, current), from_holder(current, candidate)) {
            (true, false) => return true,
            (false, true) => return false,
            _ => {}
        }
    }
    candidate.t_update >= current.t_update
}
