//! Sequence validation
//!
//! `validate` is the only way raw text becomes a [`Sequence`]. Input is
//! upper-cased, then checked for length first and alphabet second, so a
//! 19-character string with a bad symbol reports `WrongLength`.

use super::Base;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of bases in a guide sequence
pub const SEQUENCE_LENGTH: usize = 20;

/// Why a raw input string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Sequence must be exactly {} characters long (got {actual})", SEQUENCE_LENGTH)]
    WrongLength { actual: usize },

    #[error("Sequence must contain only A, T, C, G (found '{character}' at position {})", .position + 1)]
    InvalidCharacter { position: usize, character: char },
}

/// A validated 20-base sequence. Always upper-case, always the right length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sequence {
    bases: [Base; SEQUENCE_LENGTH],
}

/// Validate raw input and normalize it to an upper-case [`Sequence`]
pub fn validate(input: &str) -> Result<Sequence, ValidationError> {
    let actual = input.chars().count();
    if actual != SEQUENCE_LENGTH {
        return Err(ValidationError::WrongLength { actual });
    }

    let mut bases = [Base::A; SEQUENCE_LENGTH];
    for (position, character) in input.chars().enumerate() {
        bases[position] = Base::from_char(character)
            .ok_or(ValidationError::InvalidCharacter { position, character })?;
    }
    Ok(Sequence { bases })
}

impl Sequence {
    /// Build directly from bases; the array type already guarantees validity
    pub fn from_bases(bases: [Base; SEQUENCE_LENGTH]) -> Self {
        Self { bases }
    }

    pub fn bases(&self) -> &[Base; SEQUENCE_LENGTH] {
        &self.bases
    }

    pub fn base_at(&self, position: usize) -> Option<Base> {
        self.bases.get(position).copied()
    }

    pub fn len(&self) -> usize {
        SEQUENCE_LENGTH
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Positions at which `other` holds a different base
    pub fn differing_positions(&self, other: &Sequence) -> Vec<usize> {
        self.bases
            .iter()
            .zip(other.bases.iter())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.bases {
            write!(f, "{}", b)?;
        }
        Ok(())
    }
}

impl FromStr for Sequence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)
    }
}

impl Serialize for Sequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Sequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        validate(&raw).map_err(serde::de::Error::custom)
    }
}
