//! Bid records exchanged during consensus-based task allocation.
//!
//! Every (request, subtask) pair has exactly one bid per agent's table. Bids are never
//! removed: losing or releasing a task resets the record to blank and bumps its
//! timestamp so the release itself can be gossiped.

use crate::request::MeasurementRequest;
use crate::types::{AgentId, TaskRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Best-known claim on one subtask of a measurement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// Measurement request identifier
    pub req_id: String,
    /// Index of the subtask within the request
    pub subtask_index: usize,
    /// Main instrument of the subtask
    pub main_measurement: String,
    /// Agent that authored this copy of the record
    pub bidder: AgentId,
    /// Utility the bidder itself would earn
    pub own_bid: f64,
    /// Current winner, `None` when blank
    pub winner: Option<AgentId>,
    /// Utility of the current winner
    pub winning_bid: f64,
    /// Imaging time proposed by the winner
    pub t_img: Option<f64>,
    /// Last time this record changed [s]
    pub t_update: f64,
    /// Whether the subtask has been observed
    pub performed: bool,
}

impl Bid {
    /// Blank bid for a subtask, authored by `bidder`
    pub fn blank(req: &MeasurementRequest, subtask_index: usize, bidder: impl Into<AgentId>) -> Self {
        Self {
            req_id: req.id.clone(),
            subtask_index,
            main_measurement: req
                .main_measurement(subtask_index)
                .unwrap_or_default()
                .to_string(),
            bidder: bidder.into(),
            own_bid: 0.0,
            winner: None,
            winning_bid: 0.0,
            t_img: None,
            t_update: 0.0,
            performed: false,
        }
    }

    /// Blank bids for every subtask of a request
    pub fn blank_table(req: &MeasurementRequest, bidder: &str) -> Vec<Self> {
        (0..req.subtask_count())
            .map(|index| Self::blank(req, index, bidder))
            .collect()
    }

    /// Key of this bid in a bid table
    pub fn task(&self) -> TaskRef {
        TaskRef::new(self.req_id.clone(), self.subtask_index)
    }

    /// Whether some agent currently wins this subtask
    pub fn has_winner(&self) -> bool {
        self.winner.is_some()
    }

    /// Whether `agent` is the current winner
    pub fn is_won_by(&self, agent: &str) -> bool {
        self.winner.as_deref() == Some(agent)
    }

    /// Claim the subtask for `winner`
    pub fn claim(&mut self, winner: &str, utility: f64, t_img: f64, t: f64) {
        self.bidder = winner.to_string();
        self.own_bid = utility;
        self.winner = Some(winner.to_string());
        self.winning_bid = utility;
        self.t_img = Some(t_img);
        self.t_update = t;
    }

    /// Release the subtask, keeping the performed flag
    pub fn reset(&mut self, bidder: &str, t: f64) {
        self.bidder = bidder.to_string();
        self.own_bid = 0.0;
        self.winner = None;
        self.winning_bid = 0.0;
        self.t_img = None;
        self.t_update = t;
    }

    /// Copy of this record as authored by `bidder`
    pub fn authored_by(&self, bidder: &str) -> Self {
        let mut copy = self.clone();
        copy.bidder = bidder.to_string();
        copy
    }

    /// Whether the subtask has been carried out by time `t`
    pub fn is_completed(&self, t: f64, duration: f64) -> bool {
        self.performed || matches!(self.t_img, Some(t_img) if t_img + duration < t)
    }

    /// Whether two records carry the same claim, ignoring authorship
    pub fn same_claim(&self, other: &Bid) -> bool {
        self.winner == other.winner
            && self.winning_bid == other.winning_bid
            && self.t_img == other.t_img
            && self.performed == other.performed
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bid{} winner={} utility={:.3} t_img={:?} t_update={:.3}",
            self.task(),
            self.winner.as_deref().unwrap_or("NONE"),
            self.winning_bid,
            self.t_img,
            self.t_update
        )
    }
}
