//! Test utilities for cross-crate scenarios

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use skyweave_consensus::{dedup_rebroadcasts, BundleBuilder, ConsensusEngine};
use skyweave_core::{
    AccessRecord, AgentId, Bid, MeasurementRequest, TabulatedOracle, TaskRef, UtilityFunction,
};
use skyweave_feasibility::{
    AdcsSpec, AgentSpecs, AgentState, FeasibilityScheduler, InstrumentSpec, SatelliteState,
};
use std::collections::BTreeMap;

/// Instrument carried by every test agent
pub const INSTRUMENT: &str = "VNIR";

/// Initialize tracing once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Agile satellite with a single VNIR imager
pub fn vnir_specs() -> AgentSpecs {
    AgentSpecs {
        adcs: Some(AdcsSpec {
            max_rate: Some(1.0),
            max_torque: Some(1.0),
        }),
        instruments: vec![InstrumentSpec::rectangular(INSTRUMENT, 5.0, 10.0)],
    }
}

/// Satellite at nadir pointing
pub fn satellite(name: &str, t: f64) -> AgentState {
    AgentState::Satellite(SatelliteState {
        agent: name.to_string(),
        t,
        pos: [7000.0, 0.0, 0.0],
        vel: [0.0, 7.5, 0.0],
        attitude: [0.0, 0.0, 0.0],
        attitude_rates: [0.0; 3],
    })
}

/// Single-measurement request observable over `[t_start, t_end]`
pub fn request(id: &str, target: [f64; 3], s_max: f64, t_start: f64, t_end: f64) -> MeasurementRequest {
    MeasurementRequest::new(
        target,
        s_max,
        vec![INSTRUMENT.to_string()],
        t_start,
        t_end,
        0.0,
        10.0,
    )
    .unwrap()
    .with_id(id)
}

/// Access of `agent` to the target of `req`
pub fn access(agent: &str, req: &MeasurementRequest, t: f64, look_angle: f64) -> AccessRecord {
    AccessRecord {
        agent: agent.to_string(),
        target: req.target,
        instrument: INSTRUMENT.to_string(),
        t,
        look_angle,
    }
}

/// One consensus participant driven synchronously
pub struct ConsensusAgent {
    /// Agent name
    pub name: AgentId,
    /// Bid table and bundle
    pub engine: ConsensusEngine,
    scheduler: FeasibilityScheduler,
    outbox: Vec<Bid>,
}

/// Fully connected bid exchange with a shuffled delivery order
pub struct BidExchange {
    /// Participants
    pub agents: Vec<ConsensusAgent>,
    builder: BundleBuilder,
    oracle: TabulatedOracle,
    rng: StdRng,
}

impl BidExchange {
    /// Create an exchange between `names`; `seed` fixes the delivery order
    pub fn new(names: &[&str], oracle: TabulatedOracle, builder: BundleBuilder, seed: u64) -> Self {
        let agents = names
            .iter()
            .map(|name| ConsensusAgent {
                name: name.to_string(),
                engine: ConsensusEngine::new(*name),
                scheduler: FeasibilityScheduler::new(&vnir_specs()).unwrap(),
                outbox: Vec::new(),
            })
            .collect();
        Self {
            agents,
            builder,
            oracle,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Make every agent aware of `req`
    pub fn add_request(&mut self, req: &MeasurementRequest) {
        for agent in &mut self.agents {
            agent.engine.register_request(req);
        }
    }

    /// Plan, send and merge once. Returns the number of bids sent.
    pub fn round(&mut self, t: f64) -> usize {
        let mut outgoing: Vec<(usize, Vec<Bid>)> = Vec::new();
        for (i, agent) in self.agents.iter_mut().enumerate() {
            let state = satellite(&agent.name, t);
            let changes = self.builder.planning_phase(
                &mut agent.engine,
                &state,
                &agent.scheduler,
                &self.oracle,
                t,
            );
            agent.outbox.extend(changes);
            let bids = dedup_rebroadcasts(std::mem::take(&mut agent.outbox));
            if !bids.is_empty() {
                outgoing.push((i, bids));
            }
        }

        let mut deliveries: Vec<(usize, usize)> = Vec::new();
        for (k, (sender, _)) in outgoing.iter().enumerate() {
            for receiver in 0..self.agents.len() {
                if receiver != *sender {
                    deliveries.push((k, receiver));
                }
            }
        }
        deliveries.shuffle(&mut self.rng);

        for (k, receiver) in deliveries {
            let agent = &mut self.agents[receiver];
            let outcome = agent.engine.consensus_phase(&[], &outgoing[k].1, t);
            agent.outbox.extend(outcome.rebroadcasts);
        }

        outgoing.iter().map(|(_, bids)| bids.len()).sum()
    }

    /// Run rounds at time `t` until nothing is sent. Returns the rounds taken.
    pub fn run_until_quiet(&mut self, t: f64, max_rounds: usize) -> Option<usize> {
        (1..=max_rounds).find(|_| self.round(t) == 0)
    }

    /// Winner of every subtask as seen by `agent`
    pub fn winners(&self, agent: usize) -> BTreeMap<TaskRef, Option<AgentId>> {
        self.agents[agent]
            .engine
            .table()
            .bids()
            .map(|bid| (bid.task(), bid.winner.clone()))
            .collect()
    }
}

/// Random scenario: `requests` requests, each seen by a random subset of `agents`
pub fn random_scenario(
    agents: &[&str],
    requests: usize,
    seed: u64,
) -> (Vec<MeasurementRequest>, TabulatedOracle) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut oracle = TabulatedOracle::new(1.0);

    let reqs: Vec<MeasurementRequest> = (0..requests)
        .map(|i| {
            let req = request(
                &format!("req{i:02}"),
                [i as f64, (i * 7) as f64, 0.0],
                rng.gen_range(10.0..100.0),
                0.0,
                1000.0,
            );
            for agent in agents {
                if rng.gen_bool(0.7) {
                    let t = rng.gen_range(50.0..900.0);
                    let look_angle = rng.gen_range(-30.0..30.0);
                    oracle.add_access(access(agent, &req, t, look_angle));
                }
            }
            req
        })
        .collect();

    (reqs, oracle)
}

/// Builder with fixed utility so every agent values a subtask the same
pub fn fixed_utility_builder(max_bundle_size: usize) -> BundleBuilder {
    BundleBuilder::new(max_bundle_size, f64::INFINITY, UtilityFunction::Fixed)
}
