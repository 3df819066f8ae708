//! Integration tests across the Skyweave crates
//!
//! This test suite validates:
//! - Consensus convergence between several agents with shuffled bid delivery
//! - Relayed request and bid dissemination over a partitioned contact graph
//! - Full planning runs through the node simulation and its report

pub mod test_utils;

#[cfg(test)]
mod consensus_convergence_tests;

#[cfg(test)]
mod scenario_tests;
