//! Physical specifications of an agent relevant to pointing feasibility.

use serde::{Deserialize, Serialize};

/// Attitude determination and control subsystem
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AdcsSpec {
    /// Maximum slew rate [deg/s]
    #[serde(default, alias = "maxRate")]
    pub max_rate: Option<f64>,
    /// Maximum torque of the reaction wheels [N m]
    #[serde(default, alias = "maxTorque")]
    pub max_torque: Option<f64>,
}

/// Instrument field of view geometry [deg]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum FieldOfView {
    /// Rectangular sensor footprint
    Rectangular {
        /// Along-track angular height
        along_track: f64,
        /// Cross-track angular width
        cross_track: f64,
    },
    /// Circular sensor footprint
    Circular {
        /// Angular diameter
        diameter: f64,
    },
}

impl FieldOfView {
    /// Angular width perpendicular to the ground track
    pub fn cross_track_width(&self) -> f64 {
        match self {
            FieldOfView::Rectangular { cross_track, .. } => *cross_track,
            FieldOfView::Circular { diameter } => *diameter,
        }
    }
}

/// Instrument carried by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Instrument name; matches measurement types in requests
    pub name: String,
    /// Field of view, one per operating mode
    #[serde(default)]
    pub modes: Vec<FieldOfView>,
}

impl InstrumentSpec {
    /// Create an instrument with a single rectangular mode
    pub fn rectangular(name: impl Into<String>, along_track: f64, cross_track: f64) -> Self {
        Self {
            name: name.into(),
            modes: vec![FieldOfView::Rectangular {
                along_track,
                cross_track,
            }],
        }
    }

    /// Widest cross-track field of view across modes
    pub fn cross_track_fov(&self) -> Option<f64> {
        self.modes
            .iter()
            .map(FieldOfView::cross_track_width)
            .filter(|width| width.is_finite() && *width >= 0.0)
            .reduce(f64::max)
    }
}

/// Everything the scheduler needs to know about an agent's hardware
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentSpecs {
    /// Attitude control, absent for agents that cannot point
    #[serde(default)]
    pub adcs: Option<AdcsSpec>,
    /// Instrument payload
    #[serde(default)]
    pub instruments: Vec<InstrumentSpec>,
}

impl AgentSpecs {
    /// Names of all instruments carried
    pub fn instrument_names(&self) -> Vec<&str> {
        self.instruments.iter().map(|i| i.name.as_str()).collect()
    }
}
