//! End-to-end scenarios through the node simulation
//!
//! Every agent runs its async planning runtime; the simulated mesh only delivers
//! broadcasts between agents currently in contact.

use crate::test_utils::{access, init_tracing, request, vnir_specs};
use skyweave_core::{Config, PreplannerKind, ReplannerKind};
use skyweave_node::{
    AgentConfig, ContactConfig, RequestConfig, ScenarioConfig, Simulation, SimulationReport,
};

fn agent(name: &str) -> AgentConfig {
    AgentConfig {
        name: name.to_string(),
        specs: vnir_specs(),
        pos: [7000.0, 0.0, 0.0],
        vel: [0.0, 7.5, 0.0],
        attitude: [0.0, 0.0, 0.0],
    }
}

fn contact(a: &str, b: &str) -> ContactConfig {
    ContactConfig {
        a: a.to_string(),
        b: b.to_string(),
        start: 0.0,
        end: f64::INFINITY,
    }
}

fn generated(id: &str, requester: &str, target: [f64; 3]) -> RequestConfig {
    RequestConfig {
        id: id.to_string(),
        requester: requester.to_string(),
        t_release: 0.0,
        target,
        s_max: 100.0,
        measurements: vec!["VNIR".to_string()],
        t_start: 0.0,
        t_end: 1000.0,
        t_corr: 0.0,
        duration: 10.0,
    }
}

/// sat-1 and sat-3 only talk through sat-2
fn relay_chain() -> ScenarioConfig {
    let target = [5.0, 5.0, 0.0];
    let req = request("relay-1", target, 100.0, 0.0, 1000.0);

    ScenarioConfig {
        name: "relay-chain".to_string(),
        duration: 500.0,
        time_step: 5.0,
        config: None,
        agents: vec![agent("sat-1"), agent("sat-2"), agent("sat-3")],
        requests: vec![generated("relay-1", "sat-1", target)],
        contacts: vec![contact("sat-1", "sat-2"), contact("sat-2", "sat-3")],
        accesses: vec![access("sat-3", &req, 300.0, 0.0)],
    }
}

async fn run(scenario: ScenarioConfig, config: Option<Config>) -> SimulationReport {
    init_tracing();
    scenario.validate().unwrap();
    Simulation::new(scenario, config).run().await.unwrap()
}

#[tokio::test]
async fn test_request_relayed_to_only_capable_agent() {
    let report = run(relay_chain(), None).await;

    assert_eq!(report.winner("relay-1", 0), Some("sat-3"));
    assert_eq!(report.observations.len(), 1);
    assert_eq!(report.observations[0].agent, "sat-3");
    assert_eq!(report.observations[0].t_start, 300.0);
}

#[tokio::test]
async fn test_partitioned_agent_never_hears_request() {
    let mut scenario = relay_chain();
    scenario.contacts.retain(|c| c.b != "sat-3");

    let report = run(scenario, None).await;

    assert!(report.observations.is_empty());
    assert_eq!(report.winner("relay-1", 0), None);
}

#[tokio::test]
async fn test_preplanner_reports_observations() {
    let mut scenario = relay_chain();
    let req = request("local-1", [8.0, 1.0, 0.0], 100.0, 0.0, 1000.0);
    scenario.requests = vec![generated("local-1", "sat-1", req.target)];
    scenario.accesses = vec![access("sat-1", &req, 100.0, 0.0)];

    let mut config = Config::default_config();
    config.planner.preplanner = PreplannerKind::EarliestAccess;
    config.planner.preplanner_period = Some(50.0);
    config.planner.replanner = ReplannerKind::None;

    let report = run(scenario, Some(config)).await;

    assert_eq!(report.observations.len(), 1);
    assert_eq!(report.observations[0].agent, "sat-1");
    // the preplanner does not bid
    assert!(report.assignments.is_empty());
    assert!(report.messages_delivered > 0);
}

#[tokio::test]
async fn test_report_serializes() {
    let report = run(relay_chain(), None).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["scenario"], "relay-chain");
    assert_eq!(json["assignments"]["relay-1/0"], "sat-3");
}
