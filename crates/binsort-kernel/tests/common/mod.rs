//! Recording test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use binsort_hal::{Actuator, ActuatorDriver, Sleeper};
use binsort_kernel::{ControllerSettings, LogFeedback, SortingController};
use binsort_types::{ActuatorId, DutyCycle, SortError};

/// One observable hardware or timing event, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Set(ActuatorId, f32),
    Stop(ActuatorId),
    Sleep(Duration),
    Release(ActuatorId),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

pub fn hardware_events(log: &EventLog) -> Vec<Event> {
    events(log)
        .into_iter()
        .filter(|e| !matches!(e, Event::Sleep(_)))
        .collect()
}

pub struct RecordingActuator {
    id: ActuatorId,
    duty: DutyCycle,
    log: EventLog,
    /// Fail any command for exactly this duty value.
    fail_on: Option<f32>,
}

impl RecordingActuator {
    pub fn new(id: ActuatorId, log: &EventLog) -> Box<Self> {
        Box::new(Self {
            id,
            duty: DutyCycle::OFF,
            log: log.clone(),
            fail_on: None,
        })
    }

    pub fn failing_on(id: ActuatorId, log: &EventLog, duty: f32) -> Box<Self> {
        let mut act = Self::new(id, log);
        act.fail_on = Some(duty);
        act
    }
}

impl Actuator for RecordingActuator {
    fn id(&self) -> ActuatorId {
        self.id
    }

    fn set_duty(&mut self, duty: DutyCycle) -> Result<(), SortError> {
        let event = if duty.is_off() {
            Event::Stop(self.id)
        } else {
            Event::Set(self.id, duty.percent())
        };
        self.log.lock().unwrap().push(event);
        if self.fail_on == Some(duty.percent()) {
            return Err(SortError::hardware(self.id, "injected fault"));
        }
        self.duty = duty;
        Ok(())
    }

    fn duty(&self) -> DutyCycle {
        self.duty
    }

    fn release(&mut self) -> Result<(), SortError> {
        self.log.lock().unwrap().push(Event::Release(self.id));
        Ok(())
    }
}

/// Records every hold instead of sleeping.  When armed, the first hold
/// parks until [`Gate::open`] is called.
pub struct RecordingSleeper {
    log: EventLog,
    park: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.log.lock().unwrap().push(Event::Sleep(duration));
        let parked = self.park.lock().unwrap().take();
        if let Some((entered, release)) = parked {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
    }
}

/// Handle for a parked [`RecordingSleeper`].
pub struct Gate {
    entered: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl Gate {
    /// Block until a sequence is parked inside its first hold.
    pub fn wait_parked(&self) {
        self.entered.recv().unwrap();
    }

    pub fn open(&self) {
        self.release.send(()).unwrap();
    }
}

pub struct Rig {
    pub controller: Arc<SortingController>,
    pub log: EventLog,
    sleeper: Arc<RecordingSleeper>,
}

impl Rig {
    /// Arm the sleeper so the next hold parks.
    pub fn arm(&self) -> Gate {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.sleeper.park.lock().unwrap() = Some((entered_tx, release_rx));
        Gate {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

pub fn rig_with(
    router: Box<dyn Actuator>,
    gate: Box<dyn Actuator>,
    log: EventLog,
    settings: ControllerSettings,
) -> Rig {
    let sleeper = Arc::new(RecordingSleeper {
        log: log.clone(),
        park: Mutex::new(None),
    });
    let controller = SortingController::new(
        ActuatorDriver::new(router, gate),
        sleeper.clone(),
        Arc::new(LogFeedback),
        settings,
    )
    .expect("valid settings");
    Rig {
        controller: Arc::new(controller),
        log,
        sleeper,
    }
}

/// Controller on recording actuators, already initialised, log cleared.
pub fn ready_rig() -> Rig {
    let log: EventLog = Arc::default();
    let rig = rig_with(
        RecordingActuator::new(ActuatorId::Router, &log),
        RecordingActuator::new(ActuatorId::Gate, &log),
        log.clone(),
        ControllerSettings::default(),
    );
    assert!(rig.controller.init());
    rig.clear();
    rig
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
