//! GeneForge core
//!
//! Validates 20-base guide sequences, predicts an edit through a pluggable
//! backend (local simulation or a remote model server), and turns the
//! result into display segments for any front end.

pub mod sequence;
pub mod predict;
pub mod render;
pub mod service;

pub use sequence::{validate, Base, Sequence, ValidationError, SEQUENCE_LENGTH};
pub use predict::{
    ChangeIndicator, EditContext, LocalSimulation, PredictionBackend, PredictionError,
    PredictionRequest, PredictionResult, RemoteBackend, RemoteEndpoint, SimulationRules,
};
pub use render::{compute_display_segments, DisplaySegment};
pub use service::{PredictionService, ServiceConfig, SubmitError};
