//! `binsort-kernel` – motion sequencing and dispatch safety.
//!
//! This crate turns a classifier label into a safe, correctly timed series of
//! servo commands and guarantees that two sequences never overlap on the
//! shared mechanism.
//!
//! # Modules
//!
//! - [`calibration`] – [`Calibration`][calibration::Calibration] and
//!   [`Timing`][calibration::Timing]: per-unit duty cycles and hold times.
//! - [`sequencer`] – [`Choreography`][sequencer::Choreography] (the fixed
//!   step table per category) and
//!   [`MotionSequencer`][sequencer::MotionSequencer], which plays it through
//!   the [`ActuatorDriver`][binsort_hal::ActuatorDriver].
//! - [`guard`] – [`DispatchGuard`][guard::DispatchGuard]: the single busy
//!   flag, only ever held through a scoped token.
//! - [`dispatch`] – [`Dispatcher`][dispatch::Dispatcher]: admit-or-drop
//!   dispatch, blocking or offloaded to a mover thread.
//! - [`lifecycle`] – [`LifecycleManager`][lifecycle::LifecycleManager]:
//!   homing on startup and exactly-once release on shutdown.
//! - [`feedback`] – the best-effort audio cue collaborator.
//! - [`detection`] – picks the best detection of a classifier cycle.
//! - [`controller`] – [`SortingController`][controller::SortingController]:
//!   the inbound `notify_detection` entry point tying it all together.

pub mod calibration;
pub mod controller;
pub mod detection;
pub mod dispatch;
pub mod feedback;
pub mod guard;
pub mod lifecycle;
pub mod sequencer;

use std::sync::{Arc, Mutex, MutexGuard};

use binsort_hal::ActuatorDriver;

pub use calibration::{Calibration, Timing};
pub use controller::{ControllerSettings, SortingController};
pub use detection::select_best;
pub use dispatch::{DispatchMode, DispatchOutcome, Dispatcher};
pub use feedback::{Cue, Feedback, LogFeedback, ThreadedFeedback, play_feedback};
pub use guard::{BusyToken, DispatchGuard, OwnedBusyToken};
pub use lifecycle::{LifecycleGuard, LifecycleManager, LifecycleState};
pub use sequencer::{Choreography, MotionSequencer, SequenceReport};

/// The driver is shared between the sequencer and the shutdown path.
pub type SharedDriver = Arc<Mutex<ActuatorDriver>>;

/// Lock the shared driver, recovering the data if a previous holder
/// panicked.  A poisoned lock must never stop the release path.
pub(crate) fn lock_driver(driver: &Mutex<ActuatorDriver>) -> MutexGuard<'_, ActuatorDriver> {
    driver.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
