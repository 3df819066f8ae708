//! Utility functions scoring an observation of a measurement request.

use crate::request::MeasurementRequest;
use serde::{Deserialize, Serialize};

/// How the value of an observation changes with its imaging time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityFunction {
    /// Full score anywhere inside the availability window
    #[default]
    Fixed,
    /// Score decays linearly from `s_max` at `t_start` to zero at `t_end`
    Linear,
}

impl UtilityFunction {
    /// Raw utility of imaging `req` at `t_img`, before synergy weighting
    pub fn utility(&self, req: &MeasurementRequest, t_img: f64) -> f64 {
        if t_img < req.t_start || t_img > req.t_end {
            return 0.0;
        }

        match self {
            UtilityFunction::Fixed => req.s_max,
            UtilityFunction::Linear => {
                let span = req.t_end - req.t_start;
                if !span.is_finite() || span <= 0.0 {
                    return req.s_max;
                }
                (req.s_max * (req.t_end - t_img) / span).clamp(0.0, req.s_max)
            }
        }
    }

    /// Utility of performing one subtask of `req` at `t_img`
    pub fn subtask_utility(&self, req: &MeasurementRequest, subtask_index: usize, t_img: f64) -> f64 {
        self.utility(req, t_img) * synergy_factor(req, subtask_index)
    }
}

/// Share of the request score credited to a subtask: `(1 + |dependents|) / |measurements|`
pub fn synergy_factor(req: &MeasurementRequest, subtask_index: usize) -> f64 {
    match req.measurement_groups.get(subtask_index) {
        Some(group) if !req.measurements.is_empty() => {
            (1 + group.dependents.len()) as f64 / req.measurements.len() as f64
        }
        _ => 0.0,
    }
}
