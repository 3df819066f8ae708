//! Snapping action times to a fixed-step simulation clock.

use skyweave_core::ClockConfig;

/// Time grid imposed by the simulation clock
pub trait TimeGrid {
    /// Latest grid point at or before `t`
    fn snap_start(&self, t: f64) -> f64;
    /// Earliest grid point at or after `t`
    fn snap_end(&self, t: f64) -> f64;
}

impl TimeGrid for ClockConfig {
    fn snap_start(&self, t: f64) -> f64 {
        match self.step() {
            Some(dt) if t.is_finite() => dt * (t / dt).floor(),
            _ => t,
        }
    }

    fn snap_end(&self, t: f64) -> f64 {
        match self.step() {
            Some(dt) if t.is_finite() => dt * (t / dt).ceil(),
            _ => t,
        }
    }
}
