//! PredictionResult: the immutable outcome of one prediction request
//!
//! Field names serialize in camelCase to match what the predictor server
//! returns, so a result can be printed as JSON or read back unchanged.

use crate::sequence::Sequence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Marker for a position whose final base differs from the original
pub const CHANGED_MARK: char = '*';
/// Marker for an untouched position
pub const UNCHANGED_MARK: char = '.';

/// Per-position change markers, one per base of the edited sequence.
///
/// On the wire this is a string such as `"....*..............."`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeIndicator(Vec<bool>);

impl ChangeIndicator {
    pub fn new(markers: Vec<bool>) -> Self {
        Self(markers)
    }

    /// Compare two sequences position by position.
    ///
    /// The indicator is as long as `edited`; positions past the end of
    /// `original` count as changed.
    pub fn between(original: &str, edited: &str) -> Self {
        let mut original = original.chars();
        Self(
            edited
                .chars()
                .map(|e| original.next().map_or(true, |o| o != e))
                .collect(),
        )
    }

    /// Parse the `.`/`*` wire form. Anything other than `*` counts as unchanged.
    pub fn parse(markers: &str) -> Self {
        Self(markers.chars().map(|c| c == CHANGED_MARK).collect())
    }

    pub fn is_changed(&self, position: usize) -> bool {
        self.0.get(position).copied().unwrap_or(false)
    }

    pub fn changed_count(&self) -> usize {
        self.0.iter().filter(|c| **c).count()
    }

    /// Zero-based positions marked as changed
    pub fn changed_positions(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for ChangeIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for changed in &self.0 {
            let mark = if *changed { CHANGED_MARK } else { UNCHANGED_MARK };
            write!(f, "{}", mark)?;
        }
        Ok(())
    }
}

impl Serialize for ChangeIndicator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChangeIndicator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Risk attached to an off-target site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

/// A genomic site the edit might also hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffTarget {
    pub site: String,
    pub risk: RiskLevel,
}

/// The outcome of a single prediction. Created fresh per request, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    #[serde(default = "new_result_id")]
    pub id: String,
    pub original_sequence: String,
    pub edited_sequence: String,
    pub change_indicator: ChangeIndicator,
    /// Predicted success probability, 0..=100
    pub efficiency: f64,
    /// 1-based position of the edit, set when exactly one position changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_base: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_base: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Score of the unedited sequence, when the predictor reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_efficiency: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub off_targets: Vec<OffTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therapeutic_summary: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn new_result_id() -> String {
    Uuid::new_v4().to_string()
}

impl PredictionResult {
    /// Build a result from raw sequences and an explicit indicator.
    ///
    /// The single-edit convenience fields are filled in whenever the
    /// indicator marks exactly one position.
    pub fn from_parts(
        original: impl Into<String>,
        edited: impl Into<String>,
        change_indicator: ChangeIndicator,
        efficiency: f64,
    ) -> Self {
        let original_sequence = original.into();
        let edited_sequence = edited.into();
        let (changed_position, original_base, new_base) =
            match change_indicator.changed_positions().as_slice() {
                [only] => (
                    Some(only + 1),
                    original_sequence.chars().nth(*only),
                    edited_sequence.chars().nth(*only),
                ),
                _ => (None, None, None),
            };
        Self {
            id: new_result_id(),
            original_sequence,
            edited_sequence,
            change_indicator,
            efficiency,
            changed_position,
            original_base,
            new_base,
            message: None,
            original_efficiency: None,
            off_targets: Vec::new(),
            therapeutic_summary: None,
            created_at: Utc::now(),
        }
    }

    /// Build a result from two validated sequences, deriving the indicator
    pub fn from_sequences(original: &Sequence, edited: &Sequence, efficiency: f64) -> Self {
        let original = original.to_string();
        let edited = edited.to_string();
        let indicator = ChangeIndicator::between(&original, &edited);
        Self::from_parts(original, edited, indicator, efficiency)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn changed_count(&self) -> usize {
        self.change_indicator.changed_count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} -> {} | {} change(s) | efficiency={:.0}%",
            self.original_sequence,
            self.edited_sequence,
            self.changed_count(),
            self.efficiency
        )
    }
}
