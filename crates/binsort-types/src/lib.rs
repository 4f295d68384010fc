use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two physical actuators of the sorting bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorId {
    /// Rotates the bin so the matching compartment sits under the chute.
    Router,
    /// Opens and closes the lid that drops the item.
    Gate,
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorId::Router => write!(f, "router"),
            ActuatorId::Gate => write!(f, "gate"),
        }
    }
}

/// A PWM duty-cycle command, in percent of the signal period.
///
/// `0.0` is special: it means "stop sending pulses" and lets the servo rest
/// without torque.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DutyCycle(f32);

impl DutyCycle {
    /// Signal off.
    pub const OFF: DutyCycle = DutyCycle(0.0);

    pub const fn new(percent: f32) -> Self {
        Self(percent)
    }

    pub fn percent(self) -> f32 {
        self.0
    }

    pub fn is_off(self) -> bool {
        self.0 == 0.0
    }
}

impl fmt::Display for DutyCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

/// Waste category produced by the classifier.
///
/// Raw labels are converted with [`WasteCategory::from_label`]; anything that
/// is not one of the three trained classes becomes [`WasteCategory::Unknown`]
/// and never moves hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WasteCategory {
    Organic,
    NonOrganic,
    /// Hazardous ("B3") waste. Dropped straight into the home compartment.
    Hazardous,
    Unknown,
}

impl WasteCategory {
    /// The three categories that have a motion sequence.
    pub const SORTABLE: [WasteCategory; 3] = [
        WasteCategory::Organic,
        WasteCategory::NonOrganic,
        WasteCategory::Hazardous,
    ];

    /// Map a classifier label to a category. Matching is exact.
    pub fn from_label(label: &str) -> Self {
        match label {
            "organic" => WasteCategory::Organic,
            "non-organic" => WasteCategory::NonOrganic,
            "b3" => WasteCategory::Hazardous,
            _ => WasteCategory::Unknown,
        }
    }

    /// The classifier label for this category (`"unknown"` for
    /// [`WasteCategory::Unknown`]).
    pub fn label(self) -> &'static str {
        match self {
            WasteCategory::Organic => "organic",
            WasteCategory::NonOrganic => "non-organic",
            WasteCategory::Hazardous => "b3",
            WasteCategory::Unknown => "unknown",
        }
    }

    pub fn is_sortable(self) -> bool {
        !matches!(self, WasteCategory::Unknown)
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One step of a category's choreography.
///
/// The actuator is driven to `position` and held for `hold`. When `settle` is
/// `Some`, the signal is then switched off and the sequence waits for the
/// settle time; when it is `None` the next step follows immediately with the
/// signal still applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    pub actuator: ActuatorId,
    pub position: DutyCycle,
    pub hold: Duration,
    pub settle: Option<Duration>,
}

impl MotionStep {
    /// Total time this step keeps the sequence busy.
    pub fn duration(&self) -> Duration {
        self.hold.saturating_add(self.settle.unwrap_or_default())
    }
}

/// A single classifier result for one detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    pub fn category(&self) -> WasteCategory {
        WasteCategory::from_label(&self.label)
    }
}

/// Error type shared by the hardware layer, the sequencer and calibration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SortError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Unknown waste category: {0}")]
    UnknownCategory(String),

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),
}

impl SortError {
    pub fn hardware(component: impl fmt::Display, details: impl Into<String>) -> Self {
        SortError::HardwareFault {
            component: component.to_string(),
            details: details.into(),
        }
    }
}
