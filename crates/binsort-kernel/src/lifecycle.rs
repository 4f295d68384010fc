//! [`LifecycleManager`] – homing on startup, release on shutdown.
//!
//! ```text
//! Uninitialized ──init()──▶ Ready ──shutdown()──▶ ShuttingDown ──▶ Released
//!       │                                                            ▲  │
//!       └──────────────────────shutdown()────────────────────────────┘  └─ shutdown() is a no-op
//! ```
//!
//! Release must happen exactly once no matter how the process ends.  Hold a
//! [`LifecycleGuard`] for the lifetime of the controller: it calls
//! [`LifecycleManager::shutdown`] when dropped, which covers normal exit,
//! early return and unwinding.  Signal handlers call `shutdown` directly;
//! the guard's later call is then a no-op.

use std::sync::{Arc, Mutex, MutexGuard};

use binsort_types::ActuatorId;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::lock_driver;
use crate::sequencer::MotionSequencer;

/// Where the controller is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    ShuttingDown,
    Released,
}

/// Owns the startup and shutdown transitions of the servo mechanism.
pub struct LifecycleManager {
    state: Mutex<LifecycleState>,
    sequencer: Arc<MotionSequencer>,
}

impl LifecycleManager {
    pub fn new(sequencer: Arc<MotionSequencer>) -> Self {
        Self {
            state: Mutex::new(LifecycleState::Uninitialized),
            sequencer,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.lock_state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    /// Drive the router to its home position, hold, then switch the signal
    /// off.  Returns `true` if this call performed the initialisation; any
    /// call outside `Uninitialized` is ignored.
    pub fn init(&self) -> bool {
        let mut state = self.lock_state();
        if *state != LifecycleState::Uninitialized {
            warn!(state = ?*state, "init ignored: controller already initialised");
            return false;
        }

        {
            let driver = lock_driver(self.sequencer.driver());
            for id in [ActuatorId::Router, ActuatorId::Gate] {
                if driver.is_simulated(id) {
                    info!(actuator = %id, "running in simulation mode");
                }
            }
        }

        info!("homing router");
        let homing = self.sequencer.choreography().homing();
        // Homing runs under the state lock so a concurrent shutdown waits
        // for the router to come to rest.
        let faults = self.sequencer.run_steps(std::slice::from_ref(&homing));
        if faults > 0 {
            warn!(faults, "homing finished with servo faults");
        }

        *state = LifecycleState::Ready;
        info!("controller ready");
        true
    }

    /// Release both servo channels.  Returns `true` only for the call that
    /// performed the release.
    pub fn shutdown(&self) -> bool {
        let mut state = self.lock_state();
        match *state {
            LifecycleState::ShuttingDown | LifecycleState::Released => {
                debug!("shutdown skipped: already released");
                return false;
            }
            LifecycleState::Uninitialized | LifecycleState::Ready => {}
        }

        *state = LifecycleState::ShuttingDown;
        info!("releasing servo channels");
        let released = lock_driver(self.sequencer.driver()).release_all();
        *state = LifecycleState::Released;
        info!(channels = released, "servo channels released");
        true
    }

    /// Scope guard that runs [`shutdown`][Self::shutdown] on drop.
    pub fn guard(self: &Arc<Self>) -> LifecycleGuard {
        LifecycleGuard {
            manager: Arc::clone(self),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Releases the servos when dropped.
#[must_use = "dropping the guard shuts the controller down immediately"]
pub struct LifecycleGuard {
    manager: Arc<LifecycleManager>,
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        self.manager.shutdown();
    }
}
