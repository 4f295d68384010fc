//! [`SortingController`] – the entry point the classification loop talks to.
//!
//! ```text
//! notify_detection ─▶ label → WasteCategory ─▶ Dispatcher (admit or drop)
//!                                                 └─▶ MotionSequencer ─▶ ActuatorDriver
//! ```
//!
//! Lifecycle brackets everything: call [`init`][SortingController::init]
//! before the first detection and keep the [`LifecycleGuard`] from
//! [`guard`][SortingController::guard] alive until the process ends.

use std::sync::{Arc, Mutex};

use binsort_hal::{ActuatorDriver, Sleeper};
use binsort_types::{ActuatorId, Detection, SortError, WasteCategory};
use tracing::{info, warn};

use crate::calibration::{Calibration, Timing};
use crate::detection::select_best;
use crate::dispatch::{DispatchMode, DispatchOutcome, Dispatcher};
use crate::feedback::{Cue, Feedback, play_feedback};
use crate::lifecycle::{LifecycleGuard, LifecycleManager, LifecycleState};
use crate::sequencer::{Choreography, MotionSequencer};

/// Everything configurable about the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub calibration: Calibration,
    pub timing: Timing,
    /// Detections at or below this confidence are ignored.
    pub min_confidence: f32,
    pub mode: DispatchMode,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
            timing: Timing::default(),
            min_confidence: 0.5,
            mode: DispatchMode::Blocking,
        }
    }
}

/// Turns classifier output into servo sequences.
pub struct SortingController {
    lifecycle: Arc<LifecycleManager>,
    dispatcher: Dispatcher,
    feedback: Arc<dyn Feedback>,
    min_confidence: f32,
}

impl SortingController {
    /// Build a controller around an already-acquired driver.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::InvalidCalibration`] if the calibration's safe
    /// ranges are unusable.  Both channels of `driver` are released before
    /// the error is returned.
    pub fn new(
        mut driver: ActuatorDriver,
        sleeper: Arc<dyn Sleeper>,
        feedback: Arc<dyn Feedback>,
        settings: ControllerSettings,
    ) -> Result<Self, SortError> {
        if let Err(e) = settings.calibration.validate() {
            driver.release_all();
            return Err(e);
        }
        let calibration = settings.calibration.clamped();

        let driver = driver
            .with_range(ActuatorId::Router, calibration.router_range)
            .with_range(ActuatorId::Gate, calibration.gate_range);
        let choreography = Choreography::build(&calibration, &settings.timing);
        let sequencer = Arc::new(MotionSequencer::new(
            Arc::new(Mutex::new(driver)),
            sleeper,
            choreography,
        ));

        Ok(Self {
            lifecycle: Arc::new(LifecycleManager::new(Arc::clone(&sequencer))),
            dispatcher: Dispatcher::new(sequencer, Arc::clone(&feedback), settings.mode),
            feedback,
            min_confidence: settings.min_confidence,
        })
    }

    /// Home the router.  See [`LifecycleManager::init`].
    pub fn init(&self) -> bool {
        self.lifecycle.init()
    }

    /// Release the servos.  See [`LifecycleManager::shutdown`].
    pub fn shutdown(&self) -> bool {
        self.lifecycle.shutdown()
    }

    /// Scope guard that shuts the controller down when dropped.
    pub fn guard(&self) -> LifecycleGuard {
        self.lifecycle.guard()
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    pub fn mode(&self) -> DispatchMode {
        self.dispatcher.mode()
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Wait for an offloaded sequence to finish.
    pub fn wait_idle(&self) {
        self.dispatcher.wait_idle();
    }

    /// Inbound hook for the classifier: act on `label` if it names a
    /// sortable category.
    pub fn notify_detection(&self, label: &str, confidence: f32) -> DispatchOutcome {
        if !self.lifecycle.is_ready() {
            warn!(label, state = ?self.lifecycle.state(), "detection ignored: controller not ready");
            return DispatchOutcome::NotReady;
        }
        let category = WasteCategory::from_label(label);
        if !category.is_sortable() {
            info!(label, confidence, "unrecognised label ignored");
            play_feedback(self.feedback.as_ref(), Cue::Unrecognized);
            return DispatchOutcome::Rejected;
        }

        info!(%category, confidence, "waste detected");
        self.try_dispatch(category)
    }

    /// Dispatch `category` directly, e.g. from the manual shell.
    pub fn try_dispatch(&self, category: WasteCategory) -> DispatchOutcome {
        if !self.lifecycle.is_ready() {
            warn!(%category, state = ?self.lifecycle.state(), "dispatch refused: controller not ready");
            return DispatchOutcome::NotReady;
        }
        self.dispatcher.try_dispatch(category)
    }

    /// Handle one classifier cycle: only the best detection above the
    /// confidence threshold is acted on.  Returns `None` when nothing
    /// qualified.
    pub fn process_cycle(&self, detections: &[Detection]) -> Option<DispatchOutcome> {
        let best = select_best(detections, self.min_confidence)?;
        if self.dispatcher.is_busy() {
            // Cheap early-out; the guard still makes the real decision.
            info!(label = %best.label, confidence = best.confidence, "busy, skipping");
            return Some(DispatchOutcome::Busy);
        }
        Some(self.notify_detection(&best.label, best.confidence))
    }
}
