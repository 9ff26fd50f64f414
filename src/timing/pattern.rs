//! Heuristic detection of too-regular wait sequences

use crate::timing::types::{PatternDetection, PatternKind};
use std::collections::HashSet;

/// Minimum samples needed before any pattern is reported
pub const MIN_PATTERN_SAMPLES: usize = 3;

/// Distinct-value ratio below which a window counts as repetitive
const REPETITION_RATIO: f64 = 0.6;

/// Detect repetition, monotonic sequences or regular spacing in `waits`
/// (oldest first). Checks run in that order and the first hit wins.
pub fn detect_pattern(waits: &[f64], spacing_variance_threshold: f64) -> PatternDetection {
    if waits.len() < MIN_PATTERN_SAMPLES || waits.iter().any(|w| !w.is_finite()) {
        return PatternDetection::none();
    }

    if is_repetitive(waits) {
        return PatternDetection::found(PatternKind::Repetition);
    }

    if is_monotonic(waits) {
        return PatternDetection::found(PatternKind::Sequence);
    }

    if spacing_variance(waits) < spacing_variance_threshold {
        return PatternDetection::found(PatternKind::RegularSpacing);
    }

    PatternDetection::none()
}

fn is_repetitive(waits: &[f64]) -> bool {
    let distinct: HashSet<i64> = waits.iter().map(|w| w.round() as i64).collect();
    (distinct.len() as f64) < REPETITION_RATIO * waits.len() as f64
}

fn is_monotonic(waits: &[f64]) -> bool {
    let increasing = waits.windows(2).all(|w| w[1] > w[0]);
    let decreasing = waits.windows(2).all(|w| w[1] < w[0]);
    increasing || decreasing
}

/// Population variance of consecutive differences
fn spacing_variance(waits: &[f64]) -> f64 {
    let diffs: Vec<f64> = waits.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
    diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / diffs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_values_are_repetition() {
        let detection = detect_pattern(&[90.0; 5], 5.0);
        assert!(detection.detected);
        assert_eq!(detection.kind, Some(PatternKind::Repetition));
        assert!(detection.confidence >= 0.75);
    }

    #[test]
    fn test_rounding_merges_close_values() {
        let detection = detect_pattern(&[90.2, 89.9, 90.1, 90.4, 60.0], 5.0);
        assert_eq!(detection.kind, Some(PatternKind::Repetition));
    }

    #[test]
    fn test_increasing_is_sequence() {
        let detection = detect_pattern(&[61.0, 75.0, 80.0, 120.0, 121.5], 5.0);
        assert_eq!(detection.kind, Some(PatternKind::Sequence));
    }

    #[test]
    fn test_decreasing_is_sequence() {
        let detection = detect_pattern(&[150.0, 140.0, 100.0, 99.0, 70.0], 5.0);
        assert_eq!(detection.kind, Some(PatternKind::Sequence));
    }

    #[test]
    fn test_regular_spacing() {
        // alternating swings have wildly varying differences
        let detection = detect_pattern(&[100.0, 130.0, 101.0, 131.0, 102.0], 5.0);
        assert!(!detection.detected);

        let detection = detect_pattern(&[100.0, 110.0, 121.0, 120.0, 130.0], 50.0);
        assert_eq!(detection.kind, Some(PatternKind::RegularSpacing));
    }

    #[test]
    fn test_irregular_sequence_is_clean() {
        let detection = detect_pattern(&[95.0, 140.0, 72.0, 160.0, 88.0], 5.0);
        assert!(!detection.detected);
        assert_eq!(detection.kind, None);
    }

    #[test]
    fn test_too_few_samples() {
        assert!(!detect_pattern(&[90.0, 90.0], 5.0).detected);
        assert!(!detect_pattern(&[], 5.0).detected);
    }

    #[test]
    fn test_non_finite_values_ignored() {
        assert!(!detect_pattern(&[90.0, f64::NAN, 90.0, 90.0], 5.0).detected);
    }
}
