//! Per-unit calibration: servo duty cycles and hold times.
//!
//! Every bin is assembled slightly differently, so none of these values are
//! baked into the sequencing logic.  The defaults are the values measured on
//! the reference unit.

use std::time::Duration;

use binsort_hal::DutyRange;
use binsort_types::{DutyCycle, SortError, WasteCategory};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Duty cycles, in percent, for both servos.
///
/// The router's "return" positions are not simply `home`: the servo
/// overshoots differently depending on which side it comes back from, so each
/// side carries its own measured return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Router rest position; the hazardous compartment sits under the chute.
    pub home: f32,
    pub organic_target: f32,
    pub organic_return: f32,
    pub non_organic_target: f32,
    pub non_organic_return: f32,
    pub gate_closed: f32,
    pub gate_neutral: f32,
    pub gate_open: f32,
    pub router_range: DutyRange,
    pub gate_range: DutyRange,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            home: 7.0,
            organic_target: 5.0,
            organic_return: 9.5,
            non_organic_target: 9.53,
            non_organic_return: 4.1,
            gate_closed: 2.5,
            gate_neutral: 7.5,
            gate_open: 11.5,
            router_range: DutyRange::default(),
            gate_range: DutyRange::default(),
        }
    }
}

impl Calibration {
    /// Router (target, return) positions for `category`.  `None` for
    /// categories that never rotate the bin.
    pub fn router_positions(&self, category: WasteCategory) -> Option<(DutyCycle, DutyCycle)> {
        match category {
            WasteCategory::Organic => Some((
                DutyCycle::new(self.organic_target),
                DutyCycle::new(self.organic_return),
            )),
            WasteCategory::NonOrganic => Some((
                DutyCycle::new(self.non_organic_target),
                DutyCycle::new(self.non_organic_return),
            )),
            WasteCategory::Hazardous | WasteCategory::Unknown => None,
        }
    }

    pub fn home(&self) -> DutyCycle {
        DutyCycle::new(self.home)
    }

    /// Check that both safe ranges are usable.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::InvalidCalibration`] when a range is empty,
    /// inverted or not strictly positive.
    pub fn validate(&self) -> Result<(), SortError> {
        for (name, range) in [("router", self.router_range), ("gate", self.gate_range)] {
            if !(range.min > 0.0 && range.min < range.max && range.max <= 100.0) {
                return Err(SortError::InvalidCalibration(format!(
                    "{name} range [{}, {}] must satisfy 0 < min < max <= 100",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }

    /// Return a copy with every position clamped into its servo's safe
    /// range, logging each value that had to be moved.
    pub fn clamped(mut self) -> Self {
        let router = self.router_range;
        let gate = self.gate_range;
        for (name, value, range) in [
            ("home", &mut self.home, router),
            ("organic_target", &mut self.organic_target, router),
            ("organic_return", &mut self.organic_return, router),
            ("non_organic_target", &mut self.non_organic_target, router),
            ("non_organic_return", &mut self.non_organic_return, router),
            ("gate_closed", &mut self.gate_closed, gate),
            ("gate_neutral", &mut self.gate_neutral, gate),
            ("gate_open", &mut self.gate_open, gate),
        ] {
            let safe = range.clamp(DutyCycle::new(*value)).percent();
            if safe != *value {
                warn!(field = name, configured = *value, clamped = safe, "calibration value out of range");
                *value = safe;
            }
        }
        self
    }
}

/// Hold and settle times, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Router hold after each rotation, including homing.
    pub rotate_hold_s: f64,
    /// Rest after the router signal is switched off.
    pub router_settle_s: f64,
    pub gate_close_s: f64,
    pub gate_neutral_s: f64,
    /// Silent wait with the gate signal off while the item drops.
    pub gate_wait_s: f64,
    pub gate_open_s: f64,
    /// Rest after the gate-open signal is switched off.  Zero on the
    /// reference unit.
    pub gate_settle_s: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            rotate_hold_s: 1.0,
            router_settle_s: 0.2,
            gate_close_s: 0.7,
            gate_neutral_s: 0.5,
            gate_wait_s: 3.5,
            gate_open_s: 0.8,
            gate_settle_s: 0.0,
        }
    }
}

impl Timing {
    /// Scale every duration by `factor`.  Handy for dry runs.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            rotate_hold_s: self.rotate_hold_s * factor,
            router_settle_s: self.router_settle_s * factor,
            gate_close_s: self.gate_close_s * factor,
            gate_neutral_s: self.gate_neutral_s * factor,
            gate_wait_s: self.gate_wait_s * factor,
            gate_open_s: self.gate_open_s * factor,
            gate_settle_s: self.gate_settle_s * factor,
        }
    }

    pub fn rotate_hold(&self) -> Duration {
        secs(self.rotate_hold_s)
    }
    pub fn router_settle(&self) -> Duration {
        secs(self.router_settle_s)
    }
    pub fn gate_close(&self) -> Duration {
        secs(self.gate_close_s)
    }
    pub fn gate_neutral(&self) -> Duration {
        secs(self.gate_neutral_s)
    }
    pub fn gate_wait(&self) -> Duration {
        secs(self.gate_wait_s)
    }
    pub fn gate_open(&self) -> Duration {
        secs(self.gate_open_s)
    }
    pub fn gate_settle(&self) -> Duration {
        secs(self.gate_settle_s)
    }
}

// Rounded to whole microseconds; negative or NaN values collapse to zero.
fn secs(value: f64) -> Duration {
    let micros = (value * 1e6).round();
    if micros > 0.0 {
        Duration::from_micros(micros as u64)
    } else {
        Duration::ZERO
    }
}
