//! Audio feedback collaborator.
//!
//! A cue is played once per accepted dispatch (and once for an unrecognised
//! label).  Feedback is strictly best effort: a slow or broken audio backend
//! must never delay or fail a servo sequence, so the dispatcher only ever
//! talks to it through [`play_feedback`].

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;

use binsort_types::{SortError, WasteCategory};
use tracing::{debug, warn};

/// A sound the bin can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Category(WasteCategory),
    /// The classifier produced a label the bin cannot sort.
    Unrecognized,
}

/// Something that can play a [`Cue`].
pub trait Feedback: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the cue could not be started.  Callers log it and
    /// move on.
    fn play(&self, cue: Cue) -> Result<(), SortError>;
}

/// Feedback that only writes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn play(&self, cue: Cue) -> Result<(), SortError> {
        debug!(?cue, "[audio] cue");
        Ok(())
    }
}

/// Play `cue`, logging instead of failing.
pub fn play_feedback(feedback: &dyn Feedback, cue: Cue) {
    if let Err(e) = feedback.play(cue) {
        warn!(?cue, error = %e, "audio feedback failed");
    }
}

/// Runs another [`Feedback`] on a background thread.
///
/// [`play`][Feedback::play] only enqueues the cue.  When the queue is full
/// the cue is dropped, so the caller never blocks on audio.
pub struct ThreadedFeedback {
    tx: SyncSender<Cue>,
}

impl ThreadedFeedback {
    const QUEUE_DEPTH: usize = 4;

    /// Spawn the worker thread that drives `inner`.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::HardwareFault`] if the thread cannot be spawned.
    pub fn spawn(inner: Box<dyn Feedback>) -> Result<Self, SortError> {
        let (tx, rx) = mpsc::sync_channel::<Cue>(Self::QUEUE_DEPTH);
        thread::Builder::new()
            .name("binsort-audio".to_string())
            .spawn(move || {
                for cue in rx {
                    play_feedback(inner.as_ref(), cue);
                }
            })
            .map_err(|e| SortError::hardware("audio", format!("spawn worker: {e}")))?;
        Ok(Self { tx })
    }
}

impl Feedback for ThreadedFeedback {
    fn play(&self, cue: Cue) -> Result<(), SortError> {
        match self.tx.try_send(cue) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cue)) => {
                debug!(?cue, "audio queue full; cue dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(SortError::hardware("audio", "worker thread has stopped"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    struct Recorder {
        cues: Arc<Mutex<Vec<Cue>>>,
    }

    impl Feedback for Recorder {
        fn play(&self, cue: Cue) -> Result<(), SortError> {
            self.cues.lock().unwrap().push(cue);
            Ok(())
        }
    }

    struct Broken;

    impl Feedback for Broken {
        fn play(&self, _cue: Cue) -> Result<(), SortError> {
            Err(SortError::hardware("audio", "no mixer"))
        }
    }

    struct Slow;

    impl Feedback for Slow {
        fn play(&self, _cue: Cue) -> Result<(), SortError> {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        }
    }

    #[test]
    fn play_feedback_swallows_errors() {
        // Must not panic.
        play_feedback(&Broken, Cue::Category(WasteCategory::Organic));
    }

    #[test]
    fn threaded_feedback_delivers_cues_in_order() {
        let cues = Arc::new(Mutex::new(Vec::new()));
        let fb = ThreadedFeedback::spawn(Box::new(Recorder { cues: cues.clone() })).unwrap();
        fb.play(Cue::Category(WasteCategory::Hazardous)).unwrap();
        fb.play(Cue::Unrecognized).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while cues.lock().unwrap().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            *cues.lock().unwrap(),
            vec![Cue::Category(WasteCategory::Hazardous), Cue::Unrecognized]
        );
    }

    #[test]
    fn threaded_feedback_never_blocks_on_a_slow_backend() {
        let fb = ThreadedFeedback::spawn(Box::new(Slow)).unwrap();
        let start = Instant::now();
        for _ in 0..20 {
            fb.play(Cue::Category(WasteCategory::Organic)).unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
