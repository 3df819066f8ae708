//! Bid table: the local agent's best-known bid for every known subtask.
//!
//! Bids live in an arena keyed by request id and subtask index. Records are only ever
//! overwritten, never removed, so a subtask known once stays known.

use skyweave_core::{Bid, MeasurementRequest, TaskRef};
use std::collections::BTreeMap;

/// A known request together with one bid per subtask
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBids {
    /// The request
    pub req: MeasurementRequest,
    /// Bids indexed by subtask index
    pub bids: Vec<Bid>,
}

/// Arena of bids indexed by `(request id, subtask index)`
#[derive(Debug, Clone, Default)]
pub struct BidTable {
    entries: BTreeMap<String, RequestBids>,
}

impl BidTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a request with a blank bid per subtask authored by `agent`.
    ///
    /// Returns the new blank bids, or `None` if the request was already known.
    pub fn insert_request(&mut self, req: &MeasurementRequest, agent: &str) -> Option<Vec<Bid>> {
        if self.entries.contains_key(&req.id) {
            return None;
        }

        let bids = Bid::blank_table(req, agent);
        self.entries.insert(
            req.id.clone(),
            RequestBids {
                req: req.clone(),
                bids: bids.clone(),
            },
        );
        Some(bids)
    }

    /// Whether a request is known
    pub fn contains_request(&self, req_id: &str) -> bool {
        self.entries.contains_key(req_id)
    }

    /// Look up a known request
    pub fn request(&self, req_id: &str) -> Option<&MeasurementRequest> {
        self.entries.get(req_id).map(|entry| &entry.req)
    }

    /// Bid for one subtask
    pub fn bid(&self, task: &TaskRef) -> Option<&Bid> {
        self.entries
            .get(&task.req_id)
            .and_then(|entry| entry.bids.get(task.subtask_index))
    }

    /// Mutable bid for one subtask
    pub fn bid_mut(&mut self, task: &TaskRef) -> Option<&mut Bid> {
        self.entries
            .get_mut(&task.req_id)
            .and_then(|entry| entry.bids.get_mut(task.subtask_index))
    }

    /// Request and bid for one subtask
    pub fn get(&self, task: &TaskRef) -> Option<(&MeasurementRequest, &Bid)> {
        let entry = self.entries.get(&task.req_id)?;
        Some((&entry.req, entry.bids.get(task.subtask_index)?))
    }

    /// Known requests, ordered by id
    pub fn requests(&self) -> impl Iterator<Item = &MeasurementRequest> {
        self.entries.values().map(|entry| &entry.req)
    }

    /// Every bid in the table, ordered by request id then subtask index
    pub fn bids(&self) -> impl Iterator<Item = &Bid> {
        self.entries.values().flat_map(|entry| entry.bids.iter())
    }

    /// Number of known requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no request is known
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
