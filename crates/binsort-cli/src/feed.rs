//! Detection feed – classifier output read line by line from stdin.
//!
//! ```text
//! organic 0.91                                 plain: <label> <confidence>
//! {"label": "b3", "confidence": 0.62}          JSON object
//! <blank line>                                 end of detection cycle
//! # comment                                    ignored
//! ```
//!
//! Each cycle is handed to [`SortingController::process_cycle`], which acts
//! on the single best detection above the confidence threshold.  End of
//! input closes the last cycle.
//!
//! The binary runs the feed against an offloading controller, so reading
//! never stops while a sequence is in flight: cycles that arrive meanwhile
//! come back `Busy` and are dropped instead of piling up in the pipe.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use binsort_kernel::{DispatchOutcome, SortingController};
use binsort_types::Detection;
use tracing::{debug, error, warn};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedLine {
    Detection(Detection),
    EndOfCycle,
    Comment,
}

/// Parse one line of the feed.
pub fn parse_line(line: &str) -> Result<FeedLine, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(FeedLine::EndOfCycle);
    }
    if line.starts_with('#') {
        return Ok(FeedLine::Comment);
    }
    if line.starts_with('{') {
        return serde_json::from_str(line)
            .map(FeedLine::Detection)
            .map_err(|e| format!("invalid JSON detection: {e}"));
    }

    let mut fields = line.split_whitespace();
    let (Some(label), Some(confidence), None) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(format!("expected '<label> <confidence>', got '{line}'"));
    };
    let confidence = confidence
        .parse::<f32>()
        .map_err(|e| format!("invalid confidence '{confidence}': {e}"))?;
    Ok(FeedLine::Detection(Detection::new(label, confidence)))
}

/// Counters for one feed session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeedStats {
    pub cycles: usize,
    pub dispatched: usize,
    pub busy: usize,
    pub rejected: usize,
    /// Cycles with no detection above the threshold.
    pub idle: usize,
    pub invalid_lines: usize,
}

/// Read detection cycles from `input` until EOF or `shutdown` is set.
pub fn run(controller: &SortingController, input: impl BufRead, shutdown: &AtomicBool) -> FeedStats {
    let mut stats = FeedStats::default();
    let mut pending: Vec<Detection> = Vec::new();

    for line in input.lines() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "detection feed read failed");
                break;
            }
        };
        match parse_line(&line) {
            Ok(FeedLine::Detection(d)) => pending.push(d),
            Ok(FeedLine::EndOfCycle) => finish_cycle(controller, &mut pending, &mut stats),
            Ok(FeedLine::Comment) => {}
            Err(e) => {
                warn!(error = %e, "skipping feed line");
                stats.invalid_lines += 1;
            }
        }
    }
    if !shutdown.load(Ordering::SeqCst) {
        finish_cycle(controller, &mut pending, &mut stats);
    }
    stats
}

fn finish_cycle(controller: &SortingController, pending: &mut Vec<Detection>, stats: &mut FeedStats) {
    if pending.is_empty() {
        return;
    }
    stats.cycles += 1;
    match controller.process_cycle(pending) {
        None => {
            debug!(detections = pending.len(), "no detection above threshold");
            stats.idle += 1;
        }
        Some(outcome) => {
            crate::print_outcome(&outcome);
            match outcome {
                DispatchOutcome::Completed(_) | DispatchOutcome::Offloaded => stats.dispatched += 1,
                DispatchOutcome::Busy => stats.busy += 1,
                DispatchOutcome::Rejected | DispatchOutcome::NotReady => stats.rejected += 1,
            }
        }
    }
    pending.clear();
}
