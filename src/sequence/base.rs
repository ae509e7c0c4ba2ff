//! Base: a single nucleotide from the {A, T, C, G} alphabet

use serde::{Deserialize, Serialize};
use std::fmt;

/// One nucleotide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Base {
    A,
    T,
    C,
    G,
}

impl Base {
    /// The full alphabet, in the order the predictor server enumerates it
    pub const ALL: [Base; 4] = [Base::A, Base::T, Base::C, Base::G];

    /// Parse a single character, case-insensitively
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Base::A),
            'T' => Some(Base::T),
            'C' => Some(Base::C),
            'G' => Some(Base::G),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Base::A => 'A',
            Base::T => 'T',
            Base::C => 'C',
            Base::G => 'G',
        }
    }

    /// The three bases that differ from this one.
    ///
    /// Substituting with any of these is guaranteed to be a real edit.
    pub fn alternatives(&self) -> [Base; 3] {
        let mut out = [Base::A; 3];
        let mut i = 0;
        for b in Base::ALL {
            if b != *self {
                out[i] = b;
                i += 1;
            }
        }
        out
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_char_is_case_insensitive() {
        assert_eq!(Base::from_char('a'), Some(Base::A));
        assert_eq!(Base::from_char('G'), Some(Base::G));
        assert_eq!(Base::from_char('t'), Some(Base::T));
        assert_eq!(Base::from_char('N'), None);
        assert_eq!(Base::from_char('U'), None);
    }

    #[test]
    fn test_alternatives_exclude_self() {
        for b in Base::ALL {
            let alts = b.alternatives();
            assert!(!alts.contains(&b));
            for other in Base::ALL.iter().filter(|o| **o != b) {
                assert!(alts.contains(other), "{} missing from alternatives of {}", other, b);
            }
        }
    }

    #[test]
    fn test_char_roundtrip() {
        for b in Base::ALL {
            assert_eq!(Base::from_char(b.as_char()), Some(b));
        }
    }
}
