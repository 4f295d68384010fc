//! [`ActuatorDriver`] – sole owner of the router and gate servo channels.
//!
//! Every servo command in the system goes through this driver.  It enforces
//! three rules that the rest of the controller relies on:
//!
//! 1. **Clamping** – non-zero duty cycles are clamped into the channel's
//!    [`DutyRange`] before they reach the backend.
//! 2. **No propagation** – a backend error is logged and reported as a
//!    `false` return; it never escapes as an `Err` or a panic.
//! 3. **Release once** – after [`release`][ActuatorDriver::release] a channel
//!    ignores every further command, and releasing again is a no-op.

use binsort_types::{ActuatorId, DutyCycle};
use tracing::{debug, error, info, warn};

use crate::actuator::{Actuator, DutyRange};
use crate::pwm::{PwmActuator, PwmChannel};
use crate::sim::SimActuator;

struct Channel {
    backend: Box<dyn Actuator>,
    range: DutyRange,
    released: bool,
}

impl Channel {
    fn new(backend: Box<dyn Actuator>) -> Self {
        Self {
            backend,
            range: DutyRange::default(),
            released: false,
        }
    }
}

/// Exclusive owner of both servo channels.
pub struct ActuatorDriver {
    router: Channel,
    gate: Channel,
}

impl ActuatorDriver {
    /// Wrap two already-opened backends.
    pub fn new(router: Box<dyn Actuator>, gate: Box<dyn Actuator>) -> Self {
        Self {
            router: Channel::new(router),
            gate: Channel::new(gate),
        }
    }

    /// Both channels backed by [`SimActuator`]s.
    pub fn simulated() -> Self {
        Self::new(
            SimActuator::new(ActuatorId::Router),
            SimActuator::new(ActuatorId::Gate),
        )
    }

    /// Open the configured PWM channels, falling back to simulation for any
    /// channel that cannot be opened.  With `simulate` set no hardware is
    /// touched at all.
    pub fn acquire(router: &PwmChannel, gate: &PwmChannel, simulate: bool) -> Self {
        if simulate {
            info!("simulation mode requested; no PWM hardware will be used");
            return Self::simulated();
        }
        Self::new(
            open_or_simulate(ActuatorId::Router, router),
            open_or_simulate(ActuatorId::Gate, gate),
        )
    }

    /// Set the safe duty range for `id`.
    pub fn with_range(mut self, id: ActuatorId, range: DutyRange) -> Self {
        self.channel_mut(id).range = range;
        self
    }

    /// Drive `id` to `duty`.  Returns `true` if the command reached the
    /// backend successfully.
    pub fn set_position(&mut self, id: ActuatorId, duty: DutyCycle) -> bool {
        let channel = self.channel_mut(id);
        if channel.released {
            warn!(actuator = %id, duty = %duty, "command ignored: channel already released");
            return false;
        }

        let clamped = channel.range.clamp(duty);
        if clamped != duty {
            warn!(
                actuator = %id,
                requested = %duty,
                clamped = %clamped,
                "duty cycle outside safe range; clamped"
            );
        }

        match channel.backend.set_duty(clamped) {
            Ok(()) => {
                debug!(actuator = %id, duty = %clamped, "position set");
                true
            }
            Err(e) => {
                error!(actuator = %id, duty = %clamped, error = %e, "servo command failed");
                false
            }
        }
    }

    /// Switch the pulse train off so the servo rests without torque.
    pub fn stop_signal(&mut self, id: ActuatorId) -> bool {
        self.set_position(id, DutyCycle::OFF)
    }

    /// Disable `id` for good.  Returns `true` only for the call that actually
    /// released the channel; later calls are no-ops.
    pub fn release(&mut self, id: ActuatorId) -> bool {
        let channel = self.channel_mut(id);
        if channel.released {
            debug!(actuator = %id, "release skipped: already released");
            return false;
        }
        channel.released = true;
        if let Err(e) = channel.backend.release() {
            error!(actuator = %id, error = %e, "servo release failed");
        }
        true
    }

    /// Release both channels.  Returns how many were released by this call.
    pub fn release_all(&mut self) -> usize {
        [ActuatorId::Router, ActuatorId::Gate]
            .into_iter()
            .filter(|&id| self.release(id))
            .count()
    }

    pub fn is_released(&self, id: ActuatorId) -> bool {
        self.channel(id).released
    }

    pub fn is_simulated(&self, id: ActuatorId) -> bool {
        self.channel(id).backend.is_simulated()
    }

    /// Last duty cycle the backend accepted for `id`.
    pub fn duty(&self, id: ActuatorId) -> DutyCycle {
        self.channel(id).backend.duty()
    }

    fn channel(&self, id: ActuatorId) -> &Channel {
        match id {
            ActuatorId::Router => &self.router,
            ActuatorId::Gate => &self.gate,
        }
    }

    fn channel_mut(&mut self, id: ActuatorId) -> &mut Channel {
        match id {
            ActuatorId::Router => &mut self.router,
            ActuatorId::Gate => &mut self.gate,
        }
    }
}

fn open_or_simulate(id: ActuatorId, channel: &PwmChannel) -> Box<dyn Actuator> {
    match PwmActuator::open(id, channel) {
        Ok(pwm) => pwm as Box<dyn Actuator>,
        Err(e) => {
            warn!(actuator = %id, error = %e, "PWM unavailable; falling back to simulation");
            SimActuator::new(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binsort_types::SortError;
    use std::sync::{Arc, Mutex};

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct Counters {
        commands: Vec<DutyCycle>,
        releases: usize,
    }

    struct MockActuator {
        id: ActuatorId,
        duty: DutyCycle,
        fail: bool,
        counters: Arc<Mutex<Counters>>,
    }

    impl MockActuator {
        fn new(id: ActuatorId, fail: bool) -> (Box<Self>, Arc<Mutex<Counters>>) {
            let counters = Arc::new(Mutex::new(Counters::default()));
            let act = Box::new(Self {
                id,
                duty: DutyCycle::OFF,
                fail,
                counters: counters.clone(),
            });
            (act, counters)
        }
    }

    impl Actuator for MockActuator {
        fn id(&self) -> ActuatorId {
            self.id
        }
        fn set_duty(&mut self, duty: DutyCycle) -> Result<(), SortError> {
            self.counters.lock().unwrap().commands.push(duty);
            if self.fail {
                return Err(SortError::hardware(self.id, "bus error"));
            }
            self.duty = duty;
            Ok(())
        }
        fn duty(&self) -> DutyCycle {
            self.duty
        }
        fn release(&mut self) -> Result<(), SortError> {
            self.counters.lock().unwrap().releases += 1;
            if self.fail {
                return Err(SortError::hardware(self.id, "bus error"));
            }
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[test]
    fn set_position_reaches_backend() {
        let mut driver = ActuatorDriver::simulated();
        assert!(driver.set_position(ActuatorId::Router, DutyCycle::new(7.0)));
        assert_eq!(driver.duty(ActuatorId::Router), DutyCycle::new(7.0));
        assert!(driver.duty(ActuatorId::Gate).is_off());
    }

    #[test]
    fn out_of_range_duty_is_clamped() {
        let mut driver = ActuatorDriver::simulated()
            .with_range(ActuatorId::Gate, DutyRange { min: 2.5, max: 11.5 });
        driver.set_position(ActuatorId::Gate, DutyCycle::new(14.0));
        assert_eq!(driver.duty(ActuatorId::Gate), DutyCycle::new(11.5));
    }

    #[test]
    fn stop_signal_sends_zero_duty() {
        let mut driver = ActuatorDriver::simulated();
        driver.set_position(ActuatorId::Gate, DutyCycle::new(2.5));
        assert!(driver.stop_signal(ActuatorId::Gate));
        assert!(driver.duty(ActuatorId::Gate).is_off());
    }

    #[test]
    fn backend_failure_is_swallowed() {
        let (router, counters) = MockActuator::new(ActuatorId::Router, true);
        let mut driver = ActuatorDriver::new(router, SimActuator::new(ActuatorId::Gate));
        assert!(!driver.set_position(ActuatorId::Router, DutyCycle::new(5.0)));
        assert_eq!(counters.lock().unwrap().commands.len(), 1);
    }

    #[test]
    fn release_happens_exactly_once() {
        let (router, router_counters) = MockActuator::new(ActuatorId::Router, false);
        let (gate, gate_counters) = MockActuator::new(ActuatorId::Gate, false);
        let mut driver = ActuatorDriver::new(router, gate);

        assert_eq!(driver.release_all(), 2);
        assert_eq!(driver.release_all(), 0);
        assert!(!driver.release(ActuatorId::Router));

        assert_eq!(router_counters.lock().unwrap().releases, 1);
        assert_eq!(gate_counters.lock().unwrap().releases, 1);
        assert!(driver.is_released(ActuatorId::Router));
        assert!(driver.is_released(ActuatorId::Gate));
    }

    #[test]
    fn failed_release_still_counts_as_released() {
        let (router, counters) = MockActuator::new(ActuatorId::Router, true);
        let mut driver = ActuatorDriver::new(router, SimActuator::new(ActuatorId::Gate));
        assert!(driver.release(ActuatorId::Router));
        assert!(!driver.release(ActuatorId::Router));
        assert_eq!(counters.lock().unwrap().releases, 1);
    }

    #[test]
    fn commands_after_release_never_reach_backend() {
        let (gate, counters) = MockActuator::new(ActuatorId::Gate, false);
        let mut driver = ActuatorDriver::new(SimActuator::new(ActuatorId::Router), gate);
        driver.release(ActuatorId::Gate);
        assert!(!driver.set_position(ActuatorId::Gate, DutyCycle::new(7.5)));
        assert!(!driver.stop_signal(ActuatorId::Gate));
        assert!(counters.lock().unwrap().commands.is_empty());
    }

    #[test]
    fn forced_simulation_never_touches_hardware() {
        let driver = ActuatorDriver::acquire(&PwmChannel::new(0, 0), &PwmChannel::new(0, 1), true);
        assert!(driver.is_simulated(ActuatorId::Router));
        assert!(driver.is_simulated(ActuatorId::Gate));
    }

    #[test]
    fn missing_pwm_chip_falls_back_to_simulation() {
        // No machine running the tests has a pwmchip this high.
        let driver =
            ActuatorDriver::acquire(&PwmChannel::new(999, 0), &PwmChannel::new(999, 1), false);
        assert!(driver.is_simulated(ActuatorId::Router));
        assert!(driver.is_simulated(ActuatorId::Gate));
    }
}
