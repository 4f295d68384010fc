//! `binsort-hal` – hardware abstraction for the sorting bin's two servos.
//!
//! # Modules
//!
//! - [`actuator`] – the [`Actuator`][actuator::Actuator] trait every servo
//!   backend implements, plus the [`DutyRange`][actuator::DutyRange] safety
//!   clamp.
//! - [`sim`] – [`SimActuator`][sim::SimActuator], a log-only stand-in used
//!   when no PWM hardware is bound.
//! - [`pwm`] – [`PwmActuator`][pwm::PwmActuator], a Linux sysfs PWM backend.
//! - [`driver`] – [`ActuatorDriver`][driver::ActuatorDriver], the only
//!   component that talks to a backend.  It clamps, logs, and swallows
//!   command failures.
//! - [`sleeper`] – the [`Sleeper`][sleeper::Sleeper] seam behind every timed
//!   hold so sequences can be tested without waiting.

pub mod actuator;
pub mod driver;
pub mod pwm;
pub mod sim;
pub mod sleeper;

pub use actuator::{Actuator, DutyRange};
pub use driver::ActuatorDriver;
pub use pwm::{PwmActuator, PwmChannel};
pub use sim::SimActuator;
pub use sleeper::{Sleeper, ThreadSleeper};
