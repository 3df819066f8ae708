//! Multi-agent consensus scenarios
//!
//! Agents exchange bids over a fully connected mesh with shuffled delivery orders and
//! must end with one consistent allocation.

use crate::test_utils::{
    access, fixed_utility_builder, init_tracing, random_scenario, request, BidExchange,
};
use skyweave_consensus::{BundleBuilder, ConsensusEngine, PathElement};
use skyweave_core::{TabulatedOracle, TaskRef, UtilityFunction};
use std::collections::HashSet;

const AGENTS: [&str; 3] = ["sat-a", "sat-b", "sat-c"];

fn claim(engine: &mut ConsensusEngine, task: &TaskRef, utility: f64, t: f64) -> skyweave_core::Bid {
    let path = vec![PathElement {
        task: task.clone(),
        instrument: "VNIR".to_string(),
        look_angle: 0.0,
        t_img: 100.0,
        utility,
    }];
    engine.commit_path(path, t).remove(0)
}

#[test]
fn test_higher_bid_wins_on_both_agents() {
    init_tracing();
    let req = request("R", [0.0, 0.0, 0.0], 100.0, 0.0, 1000.0);
    let task = TaskRef::new("R", 0);

    let mut agent_1 = ConsensusEngine::new("agent-1");
    let mut agent_2 = ConsensusEngine::new("agent-2");
    agent_1.register_request(&req);
    agent_2.register_request(&req);

    let bid_1 = claim(&mut agent_1, &task, 50.0, 5.0);
    let bid_2 = claim(&mut agent_2, &task, 80.0, 6.0);

    let outcome_1 = agent_1.consensus_phase(&[], &[bid_2], 6.0);
    let outcome_2 = agent_2.consensus_phase(&[], &[bid_1], 6.0);

    for engine in [&agent_1, &agent_2] {
        let bid = engine.table().bid(&task).unwrap();
        assert_eq!(bid.winner.as_deref(), Some("agent-2"));
        assert_eq!(bid.winning_bid, 80.0);
    }
    assert!(agent_1.bundle().is_empty());
    assert_eq!(agent_2.bundle(), vec![task]);
    // the loser announces its release, the winner restates its claim
    assert!(!outcome_1.rebroadcasts.is_empty());
    assert_eq!(outcome_2.rebroadcasts.len(), 1);
}

#[test]
fn test_exchange_settles_on_one_allocation() {
    init_tracing();

    for seed in 0..10 {
        let (requests, oracle) = random_scenario(&AGENTS, 6, seed);
        let mut exchange = BidExchange::new(&AGENTS, oracle, fixed_utility_builder(3), seed);
        for req in &requests {
            exchange.add_request(req);
        }

        let rounds = exchange.run_until_quiet(0.0, 100);
        assert!(rounds.is_some(), "seed {seed} did not settle");

        // no task sits in two bundles, and every agent credits the holder
        let views: Vec<_> = (0..AGENTS.len()).map(|i| exchange.winners(i)).collect();
        let mut bundled = HashSet::new();
        for agent in &exchange.agents {
            assert!(agent.engine.bundle().len() <= 3);
            for task in agent.engine.bundle() {
                assert!(bundled.insert(task.clone()), "seed {seed}: {task} bundled twice");
                for (i, view) in views.iter().enumerate() {
                    assert_eq!(
                        view[&task].as_deref(),
                        Some(agent.name.as_str()),
                        "seed {seed}: agent {i} disagrees on {task}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_earlier_access_wins_with_decaying_utility() {
    init_tracing();
    let near = request("near", [1.0, 0.0, 0.0], 100.0, 0.0, 1000.0);
    let far = request("far", [2.0, 0.0, 0.0], 100.0, 0.0, 1000.0);

    let mut oracle = TabulatedOracle::new(1.0);
    oracle.add_access(access("sat-a", &near, 100.0, 0.0));
    oracle.add_access(access("sat-b", &near, 600.0, 0.0));
    oracle.add_access(access("sat-a", &far, 700.0, 0.0));
    oracle.add_access(access("sat-b", &far, 200.0, 0.0));

    let builder = BundleBuilder::new(2, f64::INFINITY, UtilityFunction::Linear);
    let mut exchange = BidExchange::new(&["sat-a", "sat-b"], oracle, builder, 7);
    exchange.add_request(&near);
    exchange.add_request(&far);

    assert!(exchange.run_until_quiet(0.0, 50).is_some());

    let winners = exchange.winners(0);
    assert_eq!(winners[&TaskRef::new("near", 0)].as_deref(), Some("sat-a"));
    assert_eq!(winners[&TaskRef::new("far", 0)].as_deref(), Some("sat-b"));
    assert_eq!(exchange.winners(1), winners);
}

#[test]
fn test_unreachable_request_stays_unassigned() {
    init_tracing();
    let reachable = request("seen", [1.0, 0.0, 0.0], 50.0, 0.0, 1000.0);
    let hidden = request("hidden", [9.0, 9.0, 0.0], 90.0, 0.0, 1000.0);

    let mut oracle = TabulatedOracle::new(1.0);
    oracle.add_access(access("sat-b", &reachable, 300.0, 5.0));

    let mut exchange = BidExchange::new(&AGENTS, oracle, fixed_utility_builder(3), 3);
    exchange.add_request(&reachable);
    exchange.add_request(&hidden);
    assert!(exchange.run_until_quiet(0.0, 20).is_some());

    let winners = exchange.winners(2);
    assert_eq!(winners[&TaskRef::new("seen", 0)].as_deref(), Some("sat-b"));
    assert_eq!(winners[&TaskRef::new("hidden", 0)], None);
}
