//! Log-only servo stand-in for running without physical hardware.
//!
//! [`SimActuator`] records the last commanded duty cycle and emits a log line
//! for every command.  It never fails, so the whole controller can run on a
//! laptop or in CI exactly as it would on the bin.

use binsort_types::{ActuatorId, DutyCycle, SortError};
use tracing::{debug, info};

use crate::actuator::Actuator;

/// A simulated servo that logs commands instead of emitting pulses.
pub struct SimActuator {
    id: ActuatorId,
    duty: DutyCycle,
    released: bool,
}

impl SimActuator {
    /// Create a new simulated servo for the given actuator.
    pub fn new(id: ActuatorId) -> Box<Self> {
        Box::new(Self {
            id,
            duty: DutyCycle::OFF,
            released: false,
        })
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> ActuatorId {
        self.id
    }

    fn set_duty(&mut self, duty: DutyCycle) -> Result<(), SortError> {
        if duty.is_off() {
            debug!(actuator = %self.id, "[sim] signal off");
        } else {
            info!(actuator = %self.id, duty = %duty, "[sim] move");
        }
        self.duty = duty;
        Ok(())
    }

    fn duty(&self) -> DutyCycle {
        self.duty
    }

    fn release(&mut self) -> Result<(), SortError> {
        info!(actuator = %self.id, "[sim] channel released");
        self.duty = DutyCycle::OFF;
        self.released = true;
        Ok(())
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
