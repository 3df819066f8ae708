//! Greedy bundle construction.
//!
//! The planning phase extends the agent's path one subtask at a time. Each round tries
//! every available subtask at every insertion position, re-times the whole candidate
//! path from the agent's current state, and keeps the single insertion that raises the
//! path utility the most. Rounds stop when the bundle is full or nothing improves it.

use crate::compare::outbids;
use crate::engine::{ConsensusEngine, PathElement};
use skyweave_core::{
    AccessOracle, AccessPoint, Bid, MeasurementRequest, PlannerConfig, TaskRef, UtilityFunction,
};
use skyweave_feasibility::{AgentState, FeasibilityScheduler};
use std::collections::HashMap;
use tracing::debug;

/// Greedy marginal-utility bundle builder
#[derive(Debug, Clone, PartialEq)]
pub struct BundleBuilder {
    max_bundle_size: usize,
    horizon: f64,
    utility: UtilityFunction,
}

/// Access opportunities per subtask, restricted to the planning window
type AccessTable = HashMap<TaskRef, Vec<AccessPoint>>;

impl BundleBuilder {
    /// Create a builder
    pub fn new(max_bundle_size: usize, horizon: f64, utility: UtilityFunction) -> Self {
        Self {
            max_bundle_size,
            horizon,
            utility,
        }
    }

    /// Builder configured from planner settings
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.max_bundle_size, config.horizon, config.utility)
    }

    /// Maximum number of subtasks in a bundle
    pub fn max_bundle_size(&self) -> usize {
        self.max_bundle_size
    }

    /// Extend the engine's path with available subtasks.
    ///
    /// Returns the bids that changed as a result.
    pub fn planning_phase(
        &self,
        engine: &mut ConsensusEngine,
        state: &AgentState,
        scheduler: &FeasibilityScheduler,
        oracle: &dyn AccessOracle,
        t: f64,
    ) -> Vec<Bid> {
        let mut path: Vec<PathElement> = engine.path().to_vec();
        if path.len() >= self.max_bundle_size {
            return Vec::new();
        }

        let mut accesses = AccessTable::new();
        for element in &path {
            if let Some(req) = engine.table().request(&element.task.req_id) {
                accesses.insert(
                    element.task.clone(),
                    self.access_points(engine.agent(), req, &element.instrument, oracle, t),
                );
            }
        }

        let candidates = self.available_tasks(engine, scheduler, oracle, t, &mut accesses);
        debug!(
            agent = %engine.agent(),
            candidates = candidates.len(),
            bundle = path.len(),
            "Planning phase"
        );

        let mut path_utility: f64 = path.iter().map(|element| element.utility).sum();

        while path.len() < self.max_bundle_size {
            let mut best: Option<(f64, Vec<PathElement>)> = None;

            for candidate in &candidates {
                if path.iter().any(|element| &element.task == candidate)
                    || self.excluded_by_path(engine, &path, candidate)
                {
                    continue;
                }

                for position in 0..=path.len() {
                    let mut tasks: Vec<TaskRef> =
                        path.iter().map(|element| element.task.clone()).collect();
                    tasks.insert(position, candidate.clone());

                    let Some(realized) = self.realize(engine, state, scheduler, &accesses, &tasks)
                    else {
                        continue;
                    };
                    if !self.can_outbid(engine, &realized[position]) {
                        continue;
                    }

                    let total: f64 = realized.iter().map(|element| element.utility).sum();
                    if best.as_ref().map_or(true, |(best_total, _)| total > *best_total) {
                        best = Some((total, realized));
                    }
                }
            }

            match best {
                Some((total, realized)) if total > path_utility => {
                    path_utility = total;
                    path = realized;
                }
                _ => break,
            }
        }

        engine.commit_path(path, t)
    }

    /// Known subtasks this agent could still perform, with their access points
    fn available_tasks(
        &self,
        engine: &ConsensusEngine,
        scheduler: &FeasibilityScheduler,
        oracle: &dyn AccessOracle,
        t: f64,
        accesses: &mut AccessTable,
    ) -> Vec<TaskRef> {
        let mut available = Vec::new();

        for req in engine.table().requests() {
            if req.is_expired(t) {
                continue;
            }

            for (index, group) in req.measurement_groups.iter().enumerate() {
                let task = TaskRef::new(req.id.clone(), index);
                if engine.in_bundle(&task) || !scheduler.supports(&group.main) {
                    continue;
                }
                let completed = engine
                    .table()
                    .bid(&task)
                    .map_or(true, |bid| bid.is_completed(t, req.duration));
                if completed {
                    continue;
                }

                let points = self.access_points(engine.agent(), req, &group.main, oracle, t);
                if points.is_empty() {
                    continue;
                }
                accesses.insert(task.clone(), points);
                available.push(task);
            }
        }

        available
    }

    fn access_points(
        &self,
        agent: &str,
        req: &MeasurementRequest,
        instrument: &str,
        oracle: &dyn AccessOracle,
        t: f64,
    ) -> Vec<AccessPoint> {
        let t_start = t.max(req.t_start);
        let t_end = req.latest_start().min(t + self.horizon);
        if t_start > t_end {
            return Vec::new();
        }

        let mut points = oracle.arrival_times(agent, &req.target, instrument, t_start, t_end);
        points.retain(|point| point.t.is_finite() && point.look_angle.is_finite());
        points.sort_by(|a, b| a.t.total_cmp(&b.t));
        points
    }

    /// Whether an entry of the same request on the path rules `candidate` out
    fn excluded_by_path(&self, engine: &ConsensusEngine, path: &[PathElement], candidate: &TaskRef) -> bool {
        let Some(req) = engine.table().request(&candidate.req_id) else {
            return true;
        };
        path.iter().any(|element| {
            element.task.req_id == candidate.req_id
                && req.is_mutually_exclusive(element.task.subtask_index, candidate.subtask_index)
        })
    }

    /// Whether the local agent's claim beats the current winner of an entry
    fn can_outbid(&self, engine: &ConsensusEngine, element: &PathElement) -> bool {
        match engine.table().bid(&element.task) {
            Some(bid) => match bid.winner.as_deref() {
                Some(winner) if winner != engine.agent() => {
                    outbids(element.utility, engine.agent(), bid.winning_bid, winner)
                }
                _ => true,
            },
            None => false,
        }
    }

    /// Time every entry of an ordered subtask list.
    ///
    /// Each subtask is imaged at its first access reachable from the previous entry
    /// (the first from the current state) that respects the time correlation with
    /// already-won synergistic subtasks. `None` if any entry cannot be placed.
    fn realize(
        &self,
        engine: &ConsensusEngine,
        state: &AgentState,
        scheduler: &FeasibilityScheduler,
        accesses: &AccessTable,
        tasks: &[TaskRef],
    ) -> Option<Vec<PathElement>> {
        let mut t_prev = state.t();
        let mut th_prev = state.look_angle()?;
        let mut realized: Vec<PathElement> = Vec::with_capacity(tasks.len());

        for task in tasks {
            let req = engine.table().request(&task.req_id)?;
            let instrument = req.main_measurement(task.subtask_index)?;
            let points = accesses.get(task)?;

            let point = points.iter().find(|point| {
                point.t >= t_prev
                    && scheduler
                        .maneuver_time(th_prev, point.look_angle, instrument)
                        .is_some_and(|dt| FeasibilityScheduler::fits(dt, point.t - t_prev))
                    && self.correlated(engine, &realized, req, task.subtask_index, point.t)
            })?;

            realized.push(PathElement {
                task: task.clone(),
                instrument: instrument.to_string(),
                look_angle: point.look_angle,
                t_img: point.t,
                utility: self.utility.subtask_utility(req, task.subtask_index, point.t),
            });
            t_prev = point.t + req.duration;
            th_prev = point.look_angle;
        }

        Some(realized)
    }

    /// Whether imaging subtask `index` at `t_img` stays within the allowed gap of every
    /// synergistic sibling that is already timed
    fn correlated(
        &self,
        engine: &ConsensusEngine,
        realized: &[PathElement],
        req: &MeasurementRequest,
        index: usize,
        t_img: f64,
    ) -> bool {
        (0..req.subtask_count())
            .filter(|&other| other != index && req.is_synergistic(index, other))
            .all(|other| {
                let Some(gap) = req.max_time_gap(index, other) else {
                    return true;
                };

                let sibling_time = realized
                    .iter()
                    .find(|element| {
                        element.task.req_id == req.id && element.task.subtask_index == other
                    })
                    .map(|element| element.t_img)
                    .or_else(|| {
                        engine
                            .table()
                            .bid(&TaskRef::new(req.id.clone(), other))
                            .filter(|bid| bid.has_winner() && !bid.is_won_by(engine.agent()))
                            .and_then(|bid| bid.t_img)
                    });

                sibling_time.map_or(true, |t_sibling| (t_img - t_sibling).abs() <= gap)
            })
    }
}
