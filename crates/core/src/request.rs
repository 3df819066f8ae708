//! Measurement requests and their derived subtask structure.
//!
//! A request asks the fleet for a set of measurements over a ground target within an
//! availability window. It is split into subtasks ("measurement groups"): every
//! achievable subset of the required measurements, with each member of the subset
//! taking a turn as the main instrument. The dependency matrix tells which subtasks
//! can be credited together and which are exclusive alternatives.

use crate::error::{CoreError, CoreResult};
use crate::types::{AgentId, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dependency value for two subtasks that are mutually exclusive or unrelated
pub const MUTUALLY_EXCLUSIVE: i8 = -1;
/// Dependency value on the diagonal
pub const SELF_DEPENDENCY: i8 = 0;
/// Dependency value for two subtasks that can be credited jointly
pub const SYNERGISTIC: i8 = 1;

/// One subtask of a request: a main instrument plus the instruments it depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementGroup {
    /// Instrument performing this subtask
    pub main: String,
    /// Instruments whose measurements complete this one
    pub dependents: Vec<String>,
}

/// A request for one or more measurements of a ground point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRequest {
    /// Unique request identifier (UUID)
    pub id: String,
    /// Agent that generated the request, if known
    pub requester: Option<AgentId>,
    /// Target ground point as lat [deg], lon [deg], alt [km]
    pub target: Vector3,
    /// Maximum score attainable from this request
    pub s_max: f64,
    /// Measurement types required
    pub measurements: Vec<String>,
    /// Start of availability window [s]
    pub t_start: f64,
    /// End of availability window [s]
    pub t_end: f64,
    /// Maximum decorrelation time between synergistic measurements [s]
    pub t_corr: f64,
    /// Duration of a single measurement [s]
    pub duration: f64,
    /// Reserved; computed but not used for scoring
    pub urgency: f64,
    /// Derived subtasks
    pub measurement_groups: Vec<MeasurementGroup>,
    /// Square relation matrix over `measurement_groups`
    pub dependency_matrix: Vec<Vec<i8>>,
    /// Maximum time gap between synergistic subtasks; `None` means unbounded
    pub time_dependency_matrix: Vec<Vec<Option<f64>>>,
}

impl MeasurementRequest {
    /// Create a new request with a fresh identifier and derived subtask structure
    pub fn new(
        target: Vector3,
        s_max: f64,
        measurements: Vec<String>,
        t_start: f64,
        t_end: f64,
        t_corr: f64,
        duration: f64,
    ) -> CoreResult<Self> {
        if measurements.is_empty() {
            return Err(CoreError::InvalidRequest(
                "at least one measurement is required".to_string(),
            ));
        }
        if t_start > t_end {
            return Err(CoreError::InvalidRequest(format!(
                "t_start ({t_start}) must not be after t_end ({t_end})"
            )));
        }
        if t_corr < 0.0 {
            return Err(CoreError::InvalidRequest(format!(
                "t_corr must be non-negative, got {t_corr}"
            )));
        }
        if !(duration >= 0.0) {
            return Err(CoreError::InvalidRequest(format!(
                "duration must be non-negative, got {duration}"
            )));
        }

        let urgency = if t_end.is_finite() && t_end > t_start {
            (1e-3f64).ln() / (t_start - t_end)
        } else {
            0.0
        };

        let measurement_groups = generate_measurement_groups(&measurements);
        let dependency_matrix = generate_dependency_matrix(&measurement_groups);
        let time_dependency_matrix = generate_time_dependency_matrix(&dependency_matrix, t_corr);

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            requester: None,
            target,
            s_max,
            measurements,
            t_start,
            t_end,
            t_corr,
            duration,
            urgency,
            measurement_groups,
            dependency_matrix,
            time_dependency_matrix,
        })
    }

    /// Override the generated identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Record the agent that generated this request
    pub fn with_requester(mut self, requester: impl Into<AgentId>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Number of subtasks
    pub fn subtask_count(&self) -> usize {
        self.measurement_groups.len()
    }

    /// Main instrument of a subtask
    pub fn main_measurement(&self, subtask_index: usize) -> Option<&str> {
        self.measurement_groups
            .get(subtask_index)
            .map(|group| group.main.as_str())
    }

    /// Relation value between two subtasks
    pub fn dependency(&self, i: usize, j: usize) -> i8 {
        self.dependency_matrix
            .get(i)
            .and_then(|row| row.get(j))
            .copied()
            .unwrap_or(MUTUALLY_EXCLUSIVE)
    }

    /// Whether two distinct subtasks exclude each other
    pub fn is_mutually_exclusive(&self, i: usize, j: usize) -> bool {
        i != j && self.dependency(i, j) < 0
    }

    /// Whether two subtasks can be credited jointly
    pub fn is_synergistic(&self, i: usize, j: usize) -> bool {
        self.dependency(i, j) > 0
    }

    /// Maximum allowed gap between two subtasks' imaging times
    pub fn max_time_gap(&self, i: usize, j: usize) -> Option<f64> {
        self.time_dependency_matrix
            .get(i)
            .and_then(|row| row.get(j))
            .copied()
            .flatten()
    }

    /// Latest instant at which a measurement can still start
    pub fn latest_start(&self) -> f64 {
        self.t_end - self.duration
    }

    /// Whether the request can no longer be performed at time `t`
    pub fn is_expired(&self, t: f64) -> bool {
        self.latest_start() < t
    }
}

impl fmt::Display for MeasurementRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.id.split('-').next().unwrap_or(&self.id);
        write!(f, "MeasurementReq_{}", short)
    }
}

/// Enumerate every subset of `measurements` (sizes 1..=n, in order) with each member
/// taking a turn as the main instrument.
pub fn generate_measurement_groups(measurements: &[String]) -> Vec<MeasurementGroup> {
    let mut groups = Vec::new();
    for r in 1..=measurements.len() {
        for combination in combinations(measurements, r) {
            for main in &combination {
                let dependents = combination
                    .iter()
                    .filter(|m| *m != main)
                    .cloned()
                    .collect();
                groups.push(MeasurementGroup {
                    main: main.clone(),
                    dependents,
                });
            }
        }
    }
    groups
}

/// Build the relation matrix over measurement groups.
///
/// Two groups are synergistic iff each main instrument is a dependent of the other
/// and their remaining dependents coincide; everything else is exclusive.
pub fn generate_dependency_matrix(groups: &[MeasurementGroup]) -> Vec<Vec<i8>> {
    groups
        .iter()
        .enumerate()
        .map(|(index_a, a)| {
            groups
                .iter()
                .enumerate()
                .map(|(index_b, b)| {
                    if index_a == index_b {
                        SELF_DEPENDENCY
                    } else if !b.dependents.contains(&a.main) || !a.dependents.contains(&b.main) {
                        MUTUALLY_EXCLUSIVE
                    } else {
                        let rest_a: Vec<&String> =
                            a.dependents.iter().filter(|m| **m != b.main).collect();
                        let rest_b: Vec<&String> =
                            b.dependents.iter().filter(|m| **m != a.main).collect();
                        if rest_a == rest_b {
                            SYNERGISTIC
                        } else {
                            MUTUALLY_EXCLUSIVE
                        }
                    }
                })
                .collect()
        })
        .collect()
}

/// Synergistic pairs may be at most `t_corr` apart; all other pairs are unbounded.
pub fn generate_time_dependency_matrix(
    dependency_matrix: &[Vec<i8>],
    t_corr: f64,
) -> Vec<Vec<Option<f64>>> {
    dependency_matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(|&dependency| (dependency > 0).then_some(t_corr))
                .collect()
        })
        .collect()
}

/// Ordered r-combinations of `items`
fn combinations(items: &[String], r: usize) -> Vec<Vec<String>> {
    if r == 0 {
        return vec![Vec::new()];
    }
    if items.len() < r {
        return Vec::new();
    }

    let mut result = Vec::new();
    for (i, head) in items.iter().enumerate() {
        for mut tail in combinations(&items[i + 1..], r - 1) {
            tail.insert(0, head.clone());
            result.push(tail);
        }
    }
    result
}
