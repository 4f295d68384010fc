//! [`Dispatcher`] – admit-or-drop dispatch of motion sequences.
//!
//! [`Dispatcher::try_dispatch`] enforces the controller's central invariant:
//! at most one motion sequence is executing at any time.  A request that
//! arrives while the mechanism is busy is dropped with a log line.  It is
//! never queued or retried.
//!
//! Two execution modes satisfy the invariant:
//!
//! | [`DispatchMode`] | Behaviour |
//! |---|---|
//! | `Blocking` | The sequence runs on the caller's thread; `try_dispatch` returns once it has finished. |
//! | `Offload` | The sequence runs on a mover thread that owns the busy token; `try_dispatch` returns immediately. |

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use binsort_types::WasteCategory;
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::feedback::{Cue, Feedback, play_feedback};
use crate::guard::DispatchGuard;
use crate::sequencer::{MotionSequencer, SequenceReport};

/// Where an admitted sequence executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    #[default]
    Blocking,
    Offload,
}

/// What happened to a dispatch request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The sequence ran to completion on the caller's thread.
    Completed(SequenceReport),
    /// The sequence was handed to the mover thread and may still be running.
    Offloaded,
    /// Another sequence holds the mechanism; the request was dropped.
    Busy,
    /// The category cannot be sorted; nothing was moved.
    Rejected,
    /// The controller has not been initialised or is already shut down.
    NotReady,
}

impl DispatchOutcome {
    /// `true` if a sequence was started by this request.
    pub fn is_accepted(&self) -> bool {
        matches!(self, DispatchOutcome::Completed(_) | DispatchOutcome::Offloaded)
    }
}

/// Combines the [`DispatchGuard`], the [`MotionSequencer`] and the feedback
/// collaborator.
pub struct Dispatcher {
    guard: Arc<DispatchGuard>,
    sequencer: Arc<MotionSequencer>,
    feedback: Arc<dyn Feedback>,
    mode: DispatchMode,
    mover: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        sequencer: Arc<MotionSequencer>,
        feedback: Arc<dyn Feedback>,
        mode: DispatchMode,
    ) -> Self {
        Self {
            guard: Arc::new(DispatchGuard::new()),
            sequencer,
            feedback,
            mode,
            mover: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Run `category`'s sequence unless another one is in flight.
    pub fn try_dispatch(&self, category: WasteCategory) -> DispatchOutcome {
        if !category.is_sortable() {
            info!(%category, "category rejected; nothing to sort");
            return DispatchOutcome::Rejected;
        }

        match self.mode {
            DispatchMode::Blocking => self.run_blocking(category),
            DispatchMode::Offload => self.run_offloaded(category),
        }
    }

    fn run_blocking(&self, category: WasteCategory) -> DispatchOutcome {
        let Some(_token) = self.guard.try_acquire() else {
            info!(%category, "busy, skipping");
            return DispatchOutcome::Busy;
        };

        let dispatch_id = Uuid::new_v4();
        let _span = info_span!("dispatch", %dispatch_id, %category).entered();
        play_feedback(self.feedback.as_ref(), Cue::Category(category));

        match self.sequencer.run_category(category) {
            Ok(report) => DispatchOutcome::Completed(report),
            Err(e) => {
                error!(error = %e, "sequence refused");
                DispatchOutcome::Rejected
            }
        }
    }

    fn run_offloaded(&self, category: WasteCategory) -> DispatchOutcome {
        // Held until the handle is stored: the next mover can only be
        // admitted after this one's handle is in place.
        let mut mover = self.mover.lock().unwrap_or_else(|p| p.into_inner());
        let Some(token) = self.guard.try_acquire_owned() else {
            info!(%category, "busy, skipping");
            return DispatchOutcome::Busy;
        };

        let dispatch_id = Uuid::new_v4();
        play_feedback(self.feedback.as_ref(), Cue::Category(category));

        let sequencer = Arc::clone(&self.sequencer);
        let spawned = thread::Builder::new()
            .name("binsort-mover".to_string())
            .spawn(move || {
                let _token = token;
                let _span = info_span!("dispatch", %dispatch_id, %category).entered();
                if let Err(e) = sequencer.run_category(category) {
                    error!(error = %e, "sequence refused");
                }
            });

        match spawned {
            Ok(handle) => {
                // The previous mover has already released the token, so its
                // handle can be dropped.
                *mover = Some(handle);
                DispatchOutcome::Offloaded
            }
            Err(e) => {
                // The closure (and with it the token) was dropped by the
                // failed spawn, so the guard is already clear.
                error!(%category, error = %e, "could not start mover thread");
                DispatchOutcome::Rejected
            }
        }
    }

    /// Block until the most recently admitted mover has finished.
    /// Returns immediately in blocking mode.
    pub fn wait_idle(&self) {
        let handle = self.mover.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("mover thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Calibration, Timing};
    use crate::feedback::LogFeedback;
    use crate::sequencer::Choreography;
    use binsort_hal::{ActuatorDriver, Sleeper};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Sleeper that parks the first hold until the test releases it, so the
    /// test can observe the dispatcher mid-sequence.
    struct GatedSleeper {
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Sleeper for GatedSleeper {
        fn sleep(&self, _duration: Duration) {
            if let Some(tx) = self.entered.lock().unwrap().take() {
                tx.send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    fn dispatcher(sleeper: Arc<dyn Sleeper>, mode: DispatchMode) -> Dispatcher {
        let sequencer = MotionSequencer::new(
            Arc::new(Mutex::new(ActuatorDriver::simulated())),
            sleeper,
            Choreography::build(&Calibration::default(), &Timing::default()),
        );
        Dispatcher::new(Arc::new(sequencer), Arc::new(LogFeedback), mode)
    }

    #[test]
    fn blocking_dispatch_completes_and_clears_busy() {
        let d = dispatcher(Arc::new(NoSleep), DispatchMode::Blocking);
        let outcome = d.try_dispatch(WasteCategory::Hazardous);
        assert!(matches!(outcome, DispatchOutcome::Completed(ref r) if r.steps == 3));
        assert!(outcome.is_accepted());
        assert!(!d.is_busy());
    }

    #[test]
    fn unknown_category_is_rejected_without_touching_guard() {
        let d = dispatcher(Arc::new(NoSleep), DispatchMode::Blocking);
        assert_eq!(d.try_dispatch(WasteCategory::Unknown), DispatchOutcome::Rejected);
        assert!(!d.is_busy());
    }

    #[test]
    fn offloaded_dispatch_holds_guard_until_mover_finishes() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let sleeper = Arc::new(GatedSleeper {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        });
        let d = dispatcher(sleeper, DispatchMode::Offload);

        assert_eq!(d.try_dispatch(WasteCategory::Organic), DispatchOutcome::Offloaded);
        entered_rx.recv().unwrap();

        // Mover is parked mid-sequence.
        assert!(d.is_busy());
        assert_eq!(d.try_dispatch(WasteCategory::NonOrganic), DispatchOutcome::Busy);

        release_tx.send(()).unwrap();
        d.wait_idle();
        assert!(!d.is_busy());
        assert_eq!(d.try_dispatch(WasteCategory::Hazardous), DispatchOutcome::Offloaded);
        d.wait_idle();
    }

    #[test]
    fn wait_idle_joins_the_latest_mover_under_contention() {
        let d = Arc::new(dispatcher(Arc::new(NoSleep), DispatchMode::Offload));
        let callers: Vec<_> = (0..8)
            .map(|_| {
                let d = Arc::clone(&d);
                thread::spawn(move || {
                    for _ in 0..50 {
                        d.try_dispatch(WasteCategory::Hazardous);
                    }
                })
            })
            .collect();
        for caller in callers {
            caller.join().unwrap();
        }

        d.wait_idle();
        assert!(!d.is_busy());
    }

    #[test]
    fn wait_idle_is_a_noop_in_blocking_mode() {
        let d = dispatcher(Arc::new(NoSleep), DispatchMode::Blocking);
        d.wait_idle();
        assert_eq!(d.mode(), DispatchMode::Blocking);
    }
}
