//! Skyweave Consensus - decentralized task allocation by bid gossip
//!
//! Agents agree on who performs which subtask without a central scheduler. Each agent
//! keeps a bid table, merges the bids it hears with a deterministic comparator, and
//! greedily grows a capacity-bounded bundle of subtasks it can still win.
//!
//! # Core Components
//!
//! - **Comparator**: total order over competing claims on one subtask
//! - **Bid Table**: arena of bids keyed by request id and subtask index
//! - **Consensus Engine**: compare, expire and complete checks with cascading drops
//! - **Bundle Builder**: greedy marginal-utility insertion under slew constraints
//!
//! # Example Usage
//!
//! ```rust
//! use skyweave_consensus::ConsensusEngine;
//! use skyweave_core::MeasurementRequest;
//!
//! let req = MeasurementRequest::new(
//!     [0.0, 0.0, 0.0], 100.0, vec!["VNIR".to_string()], 0.0, 1000.0, 0.0, 10.0,
//! ).unwrap();
//!
//! let mut engine = ConsensusEngine::new("sat-1");
//! let outcome = engine.consensus_phase(&[req], &[], 0.0);
//! assert_eq!(outcome.rebroadcasts.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod compare;
pub mod engine;
pub mod results;

pub use builder::BundleBuilder;
pub use compare::{merge_bid, outbids, MergeOutcome};
pub use engine::{dedup_rebroadcasts, ConsensusEngine, PathElement, PhaseOutcome};
pub use results::{BidTable, RequestBids};
