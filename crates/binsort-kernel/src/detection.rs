//! Best-detection selection for one classifier cycle.

use binsort_types::Detection;

/// The highest-confidence detection strictly above `min_confidence`.
///
/// Ties keep the earliest detection.  NaN confidences never win.
pub fn select_best(detections: &[Detection], min_confidence: f32) -> Option<&Detection> {
    detections
        .iter()
        .filter(|d| d.confidence > min_confidence)
        .fold(None, |best: Option<&Detection>, d| match best {
            Some(b) if b.confidence >= d.confidence => Some(b),
            _ => Some(d),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_confidence() {
        let cycle = vec![
            Detection::new("organic", 0.61),
            Detection::new("b3", 0.93),
            Detection::new("non-organic", 0.75),
        ];
        assert_eq!(select_best(&cycle, 0.5).unwrap().label, "b3");
    }

    #[test]
    fn threshold_is_strict() {
        let cycle = vec![Detection::new("organic", 0.5)];
        assert!(select_best(&cycle, 0.5).is_none());
    }

    #[test]
    fn empty_cycle_has_no_winner() {
        assert!(select_best(&[], 0.0).is_none());
    }

    #[test]
    fn ties_keep_first_detection() {
        let cycle = vec![Detection::new("organic", 0.8), Detection::new("b3", 0.8)];
        assert_eq!(select_best(&cycle, 0.5).unwrap().label, "organic");
    }

    #[test]
    fn nan_confidence_is_ignored() {
        let cycle = vec![Detection::new("b3", f32::NAN), Detection::new("organic", 0.7)];
        assert_eq!(select_best(&cycle, 0.5).unwrap().label, "organic");
    }

    #[test]
    fn unknown_labels_still_compete() {
        // Selection is label-agnostic; rejection happens at dispatch.
        let cycle = vec![Detection::new("plastic-cup", 0.99), Detection::new("organic", 0.7)];
        assert_eq!(select_best(&cycle, 0.5).unwrap().label, "plastic-cup");
    }
}
