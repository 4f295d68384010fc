//! Generic `Actuator` trait for duty-cycle controlled servos.
//!
//! Backends implement this trait and are handed to the
//! [`ActuatorDriver`][crate::driver::ActuatorDriver].  Nothing above the
//! driver knows whether it is talking to a real PWM channel or to the
//! simulation stand-in.

use binsort_types::{ActuatorId, DutyCycle, SortError};
use serde::{Deserialize, Serialize};

/// A duty-cycle controlled servo channel.
pub trait Actuator: Send {
    /// Which of the two bin servos this backend drives.
    fn id(&self) -> ActuatorId;

    /// Apply `duty` to the output.  [`DutyCycle::OFF`] stops the pulse train.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::HardwareFault`] if the command cannot be written
    /// to the channel.
    fn set_duty(&mut self, duty: DutyCycle) -> Result<(), SortError>;

    /// The most recently applied duty cycle.
    fn duty(&self) -> DutyCycle;

    /// Disable the output permanently and give the channel back to the OS.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::HardwareFault`] if the channel could not be
    /// disabled.
    fn release(&mut self) -> Result<(), SortError>;

    /// `true` for log-only stand-ins that never touch hardware.
    fn is_simulated(&self) -> bool {
        false
    }
}

/// Physical safe range of a servo, in duty-cycle percent.
///
/// Every non-zero command is clamped into `[min, max]`; [`DutyCycle::OFF`]
/// passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DutyRange {
    pub min: f32,
    pub max: f32,
}

impl Default for DutyRange {
    /// 0.5 ms – 2.5 ms pulses on a 20 ms period.
    fn default() -> Self {
        Self {
            min: 2.5,
            max: 12.5,
        }
    }
}

impl DutyRange {
    pub fn clamp(&self, duty: DutyCycle) -> DutyCycle {
        if duty.is_off() {
            return duty;
        }
        DutyCycle::new(duty.percent().clamp(self.min, self.max))
    }

    pub fn contains(&self, duty: DutyCycle) -> bool {
        duty.is_off() || (self.min..=self.max).contains(&duty.percent())
    }
}
