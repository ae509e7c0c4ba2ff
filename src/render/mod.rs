//! Diff rendering for prediction results
//!
//! `compute_display_segments` is the consumer-facing contract: a pure,
//! positional zip of the edited sequence with its change markers. The other
//! helpers turn segments into terminal text.

use crate::predict::{PredictionResult, CHANGED_MARK, UNCHANGED_MARK};
use serde::{Deserialize, Serialize};

/// One character of the edited sequence and whether it was changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySegment {
    pub base: char,
    pub changed: bool,
}

/// Zip `edited_sequence` with `change_indicator`, one segment per character.
///
/// Positions past the end of the indicator are reported as unchanged.
pub fn compute_display_segments(result: &PredictionResult) -> Vec<DisplaySegment> {
    result
        .edited_sequence
        .chars()
        .enumerate()
        .map(|(i, base)| DisplaySegment {
            base,
            changed: result.change_indicator.is_changed(i),
        })
        .collect()
}

/// The `.`/`*` line drawn under the edited sequence
pub fn marker_line(segments: &[DisplaySegment]) -> String {
    segments
        .iter()
        .map(|s| if s.changed { CHANGED_MARK } else { UNCHANGED_MARK })
        .collect()
}

/// Edited sequence with changed bases wrapped in brackets, e.g. `AC[G]T`
pub fn highlight(segments: &[DisplaySegment]) -> String {
    let mut out = String::with_capacity(segments.len() * 3);
    for s in segments {
        if s.changed {
            out.push('[');
            out.push(s.base);
            out.push(']');
        } else {
            out.push(s.base);
        }
    }
    out
}

/// Horizontal gauge for an efficiency score, e.g. `[########--] 85%`
pub fn efficiency_gauge(efficiency: f64, width: usize) -> String {
    let pct = if efficiency.is_finite() { efficiency.clamp(0.0, 100.0) } else { 0.0 };
    let filled = (pct * width as f64 / 100.0).round() as usize;
    format!(
        "[{}{}] {:.0}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        pct
    )
}
