//! [`MotionSequencer`] – plays a category's choreography on the servos.
//!
//! # Choreography
//!
//! Every sortable category shares the same gate cycle; the categories differ
//! only in whether the router rotates the bin around it:
//!
//! | Category | Steps |
//! |---|---|
//! | `Hazardous` | gate cycle |
//! | `Organic` | router → organic target, gate cycle, router → organic return |
//! | `NonOrganic` | router → non-organic target, gate cycle, router → non-organic return |
//!
//! The gate cycle is *close → neutral → (signal off, long wait) → open →
//! signal off*.  Router moves hold for `rotate_hold`, then switch the signal
//! off and settle.
//!
//! Steps run strictly in order.  A failed servo command is counted in the
//! [`SequenceReport`] and the sequence carries on with the next step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use binsort_hal::Sleeper;
use binsort_types::{ActuatorId, DutyCycle, MotionStep, SortError, WasteCategory};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::calibration::{Calibration, Timing};
use crate::{SharedDriver, lock_driver};

/// The fixed step tables, built once from a [`Calibration`] and [`Timing`].
#[derive(Debug, Clone, PartialEq)]
pub struct Choreography {
    homing: MotionStep,
    organic: Vec<MotionStep>,
    non_organic: Vec<MotionStep>,
    hazardous: Vec<MotionStep>,
}

impl Choreography {
    pub fn build(calibration: &Calibration, timing: &Timing) -> Self {
        let gate = gate_cycle(calibration, timing);
        let around_gate = |category: WasteCategory| -> Vec<MotionStep> {
            let mut steps = Vec::with_capacity(gate.len() + 2);
            if let Some((target, back)) = calibration.router_positions(category) {
                steps.push(router_move(target, timing));
                steps.extend_from_slice(&gate);
                steps.push(router_move(back, timing));
            }
            steps
        };

        Self {
            homing: router_move(calibration.home(), timing),
            organic: around_gate(WasteCategory::Organic),
            non_organic: around_gate(WasteCategory::NonOrganic),
            hazardous: gate.to_vec(),
        }
    }

    /// Steps for `category`, or `None` for [`WasteCategory::Unknown`].
    pub fn steps(&self, category: WasteCategory) -> Option<&[MotionStep]> {
        match category {
            WasteCategory::Organic => Some(&self.organic),
            WasteCategory::NonOrganic => Some(&self.non_organic),
            WasteCategory::Hazardous => Some(&self.hazardous),
            WasteCategory::Unknown => None,
        }
    }

    /// Router move to the home position, run once at startup.
    pub fn homing(&self) -> MotionStep {
        self.homing
    }

    /// Sum of every hold and settle in the category's sequence.
    pub fn duration(&self, category: WasteCategory) -> Duration {
        self.steps(category)
            .map(|steps| {
                steps
                    .iter()
                    .fold(Duration::ZERO, |total, step| total.saturating_add(step.duration()))
            })
            .unwrap_or_default()
    }
}

fn router_move(position: DutyCycle, timing: &Timing) -> MotionStep {
    MotionStep {
        actuator: ActuatorId::Router,
        position,
        hold: timing.rotate_hold(),
        settle: Some(timing.router_settle()),
    }
}

fn gate_cycle(calibration: &Calibration, timing: &Timing) -> [MotionStep; 3] {
    [
        // Close, then go straight on to neutral with the signal still on.
        MotionStep {
            actuator: ActuatorId::Gate,
            position: DutyCycle::new(calibration.gate_closed),
            hold: timing.gate_close(),
            settle: None,
        },
        MotionStep {
            actuator: ActuatorId::Gate,
            position: DutyCycle::new(calibration.gate_neutral),
            hold: timing.gate_neutral(),
            settle: Some(timing.gate_wait()),
        },
        MotionStep {
            actuator: ActuatorId::Gate,
            position: DutyCycle::new(calibration.gate_open),
            hold: timing.gate_open(),
            settle: Some(timing.gate_settle()),
        },
    ]
}

/// Outcome of one full sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport {
    pub category: WasteCategory,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub steps: usize,
    /// Servo commands that did not reach the hardware.
    pub faults: usize,
}

/// Executes [`Choreography`] steps through the shared driver.
pub struct MotionSequencer {
    driver: SharedDriver,
    sleeper: Arc<dyn Sleeper>,
    choreography: Choreography,
}

impl MotionSequencer {
    pub fn new(driver: SharedDriver, sleeper: Arc<dyn Sleeper>, choreography: Choreography) -> Self {
        Self {
            driver,
            sleeper,
            choreography,
        }
    }

    pub fn choreography(&self) -> &Choreography {
        &self.choreography
    }

    pub fn driver(&self) -> &SharedDriver {
        &self.driver
    }

    /// Run the full sequence for `category` and return once it has finished.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::UnknownCategory`] for [`WasteCategory::Unknown`];
    /// no servo is touched in that case.  Servo failures are never returned,
    /// only counted in the report.
    pub fn run_category(&self, category: WasteCategory) -> Result<SequenceReport, SortError> {
        let steps = self
            .choreography
            .steps(category)
            .ok_or_else(|| SortError::UnknownCategory(category.to_string()))?;

        info!(
            %category,
            steps = steps.len(),
            expected_ms = self.choreography.duration(category).as_millis() as u64,
            "sequence started"
        );
        let started_at = Utc::now();
        let start = Instant::now();
        let faults = self.run_steps(steps);
        let report = SequenceReport {
            category,
            started_at,
            elapsed: start.elapsed(),
            steps: steps.len(),
            faults,
        };

        if report.faults > 0 {
            warn!(
                %category,
                faults = report.faults,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "sequence finished with servo faults"
            );
        } else {
            info!(%category, elapsed_ms = report.elapsed.as_millis() as u64, "sequence finished");
        }
        Ok(report)
    }

    /// Execute `steps` in order and return how many servo commands failed.
    /// Used directly for homing.
    pub fn run_steps(&self, steps: &[MotionStep]) -> usize {
        let mut faults = 0;

        for (index, step) in steps.iter().enumerate() {
            debug!(
                index,
                actuator = %step.actuator,
                duty = %step.position,
                hold_ms = step.hold.as_millis() as u64,
                "step"
            );
            // The driver lock is only held per command, never across a hold.
            if !lock_driver(&self.driver).set_position(step.actuator, step.position) {
                faults += 1;
            }
            self.sleeper.sleep(step.hold);

            if let Some(settle) = step.settle {
                if !lock_driver(&self.driver).stop_signal(step.actuator) {
                    faults += 1;
                }
                if !settle.is_zero() {
                    self.sleeper.sleep(settle);
                }
            }
        }

        faults
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binsort_hal::ActuatorDriver;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        total: Mutex<Duration>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            *self.total.lock().unwrap() += duration;
        }
    }

    fn sequencer() -> (MotionSequencer, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let seq = MotionSequencer::new(
            Arc::new(Mutex::new(ActuatorDriver::simulated())),
            sleeper.clone(),
            Choreography::build(&Calibration::default(), &Timing::default()),
        );
        (seq, sleeper)
    }

    #[test]
    fn hazardous_only_moves_the_gate() {
        let table = Choreography::build(&Calibration::default(), &Timing::default());
        let steps = table.steps(WasteCategory::Hazardous).unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.actuator == ActuatorId::Gate));
    }

    #[test]
    fn organic_wraps_gate_cycle_in_router_moves() {
        let cal = Calibration::default();
        let table = Choreography::build(&cal, &Timing::default());
        let steps = table.steps(WasteCategory::Organic).unwrap();
        let positions: Vec<(ActuatorId, f32)> =
            steps.iter().map(|s| (s.actuator, s.position.percent())).collect();
        assert_eq!(
            positions,
            vec![
                (ActuatorId::Router, cal.organic_target),
                (ActuatorId::Gate, cal.gate_closed),
                (ActuatorId::Gate, cal.gate_neutral),
                (ActuatorId::Gate, cal.gate_open),
                (ActuatorId::Router, cal.organic_return),
            ]
        );
    }

    #[test]
    fn non_organic_uses_mirrored_positions() {
        let cal = Calibration::default();
        let table = Choreography::build(&cal, &Timing::default());
        let steps = table.steps(WasteCategory::NonOrganic).unwrap();
        assert_eq!(steps.first().unwrap().position.percent(), cal.non_organic_target);
        assert_eq!(steps.last().unwrap().position.percent(), cal.non_organic_return);
    }

    #[test]
    fn unknown_has_no_steps() {
        let table = Choreography::build(&Calibration::default(), &Timing::default());
        assert!(table.steps(WasteCategory::Unknown).is_none());
        assert_eq!(table.duration(WasteCategory::Unknown), Duration::ZERO);
    }

    #[test]
    fn hazardous_duration_matches_gate_cycle() {
        let table = Choreography::build(&Calibration::default(), &Timing::default());
        // 0.7 + 0.5 + 3.5 + 0.8
        assert_eq!(table.duration(WasteCategory::Hazardous), Duration::from_millis(5500));
    }

    #[test]
    fn huge_timing_saturates_instead_of_overflowing() {
        let timing = Timing {
            gate_wait_s: 1e30,
            ..Timing::default()
        };
        let table = Choreography::build(&Calibration::default(), &timing);
        assert!(table.duration(WasteCategory::Organic) > Duration::from_secs(1_000_000));
    }

    #[test]
    fn run_category_sleeps_for_every_hold_and_settle() {
        let (seq, sleeper) = sequencer();
        let report = seq.run_category(WasteCategory::Organic).unwrap();
        assert_eq!(report.steps, 5);
        assert_eq!(report.faults, 0);
        assert_eq!(
            *sleeper.total.lock().unwrap(),
            seq.choreography().duration(WasteCategory::Organic)
        );
    }

    #[test]
    fn run_category_leaves_both_signals_off() {
        let (seq, _) = sequencer();
        seq.run_category(WasteCategory::NonOrganic).unwrap();
        let driver = lock_driver(seq.driver());
        assert!(driver.duty(ActuatorId::Router).is_off());
        assert!(driver.duty(ActuatorId::Gate).is_off());
    }

    #[test]
    fn run_category_rejects_unknown() {
        let (seq, sleeper) = sequencer();
        let result = seq.run_category(WasteCategory::Unknown);
        assert!(matches!(result, Err(SortError::UnknownCategory(_))));
        assert_eq!(*sleeper.total.lock().unwrap(), Duration::ZERO);
    }

    #[test]
    fn released_driver_counts_faults_but_completes() {
        let (seq, sleeper) = sequencer();
        lock_driver(seq.driver()).release_all();
        let report = seq.run_category(WasteCategory::Hazardous).unwrap();
        // Three moves plus two signal-off commands, all refused.
        assert_eq!(report.faults, 5);
        assert_eq!(
            *sleeper.total.lock().unwrap(),
            seq.choreography().duration(WasteCategory::Hazardous)
        );
    }
}
