//! Edit prediction
//!
//! A [`PredictionBackend`] turns a validated [`PredictionRequest`] into a
//! [`PredictionResult`]. Two backends ship with the crate:
//! - [`LocalSimulation`]: offline, randomized point mutations
//! - [`RemoteBackend`]: the model server's `/predict` endpoint over HTTP

mod request;
mod result;
mod backend;
pub mod simulation;
pub mod remote;

pub use request::{EditContext, PredictionRequest};
pub use result::{ChangeIndicator, OffTarget, PredictionResult, RiskLevel, CHANGED_MARK, UNCHANGED_MARK};
pub use backend::{PredictionBackend, PredictionError};
pub use simulation::{simulate_edit, LocalSimulation, SimulationRules};
pub use remote::{RemoteBackend, RemoteEndpoint};
