//! Nucleotide sequences
//!
//! A guide sequence is exactly 20 bases over {A, T, C, G}. Raw user input
//! only becomes a [`Sequence`] by passing through [`validate`], so every
//! downstream stage can rely on the length and alphabet invariants.

mod base;
mod validate;

pub use base::Base;
pub use validate::{validate, Sequence, ValidationError, SEQUENCE_LENGTH};
