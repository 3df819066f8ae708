//! Bundle Builder Performance Benchmarks
//!
//! Measures the cost of the consensus planning loop:
//! - Greedy bundle construction over a growing request set
//! - Consensus phase over a batch of foreign bids

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use skyweave_consensus::{BundleBuilder, ConsensusEngine};
use skyweave_core::{AccessRecord, Bid, MeasurementRequest, TabulatedOracle, UtilityFunction};
use skyweave_feasibility::{
    AdcsSpec, AgentSpecs, AgentState, FeasibilityScheduler, InstrumentSpec, SatelliteState,
};

fn scheduler() -> FeasibilityScheduler {
    FeasibilityScheduler::new(&AgentSpecs {
        adcs: Some(AdcsSpec {
            max_rate: Some(1.0),
            max_torque: Some(1.0),
        }),
        instruments: vec![InstrumentSpec::rectangular("VNIR", 5.0, 10.0)],
    })
    .unwrap()
}

fn state() -> AgentState {
    AgentState::Satellite(SatelliteState {
        agent: "sat-1".to_string(),
        t: 0.0,
        pos: [7000.0, 0.0, 0.0],
        vel: [0.0, 7.5, 0.0],
        attitude: [0.0, 0.0, 0.0],
        attitude_rates: [0.0; 3],
    })
}

/// Requests with one access each, spread over the day with alternating look angles
fn scenario(count: usize) -> (Vec<MeasurementRequest>, TabulatedOracle) {
    let mut oracle = TabulatedOracle::new(1.0);
    let requests: Vec<MeasurementRequest> = (0..count)
        .map(|i| {
            let req = MeasurementRequest::new(
                [i as f64, 0.0, 0.0],
                100.0 + i as f64,
                vec!["VNIR".to_string()],
                0.0,
                86_400.0,
                0.0,
                10.0,
            )
            .unwrap()
            .with_id(format!("req-{i:04}"));

            oracle.add_access(AccessRecord {
                agent: "sat-1".to_string(),
                target: req.target,
                instrument: "VNIR".to_string(),
                t: 60.0 * (i + 1) as f64,
                look_angle: if i % 2 == 0 { 15.0 } else { -15.0 },
            });
            req
        })
        .collect();
    (requests, oracle)
}

/// Benchmark: planning phase with varying request counts
fn bench_planning_phase(c: &mut Criterion) {
    let scheduler = scheduler();
    let state = state();
    let builder = BundleBuilder::new(5, f64::INFINITY, UtilityFunction::Linear);

    for count in [10, 50, 200] {
        let (requests, oracle) = scenario(count);

        c.bench_with_input(BenchmarkId::new("planning_phase", count), &count, |b, _| {
            b.iter(|| {
                let mut engine = ConsensusEngine::new("sat-1");
                for req in &requests {
                    engine.register_request(req);
                }
                black_box(builder.planning_phase(&mut engine, &state, &scheduler, &oracle, 0.0));
            });
        });
    }
}

/// Benchmark: consensus phase over a full table of foreign claims
fn bench_consensus_phase(c: &mut Criterion) {
    let (requests, _) = scenario(200);
    let foreign: Vec<Bid> = requests
        .iter()
        .map(|req| {
            let mut bid = Bid::blank(req, 0, "sat-2");
            bid.claim("sat-2", 50.0, 600.0, 1.0);
            bid
        })
        .collect();

    c.bench_function("consensus_phase_200", |b| {
        b.iter(|| {
            let mut engine = ConsensusEngine::new("sat-1");
            black_box(engine.consensus_phase(&requests, &foreign, 2.0));
        });
    });
}

criterion_group!(benches, bench_planning_phase, bench_consensus_phase);
criterion_main!(benches);
