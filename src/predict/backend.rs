//! PredictionBackend: the strategy seam between the service and a predictor
//!
//! Implementations are chosen once, when the service is built from its
//! config. The service never branches on which one it holds.

use super::{PredictionRequest, PredictionResult};
use async_trait::async_trait;
use std::time::Duration;

/// Why a prediction could not be produced
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    /// The predictor could not be reached or the connection broke
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// The predictor answered but rejected the request or sent garbage
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Prediction timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Anything unexpected, normalized at the service boundary
    #[error("Internal prediction error: {0}")]
    Internal(String),
}

impl PredictionError {
    /// Only connectivity blips are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, PredictionError::TransportFailure(_))
    }

    /// Best message to show an end user
    pub fn user_message(&self) -> String {
        match self {
            PredictionError::ServerError { message, .. } => message.clone(),
            PredictionError::TransportFailure(_) => {
                "Failed to reach the prediction server. Please check that it is running.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// A source of predictions: local simulation or a remote model server
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    async fn predict(&self, request: PredictionRequest) -> Result<PredictionResult, PredictionError>;

    /// Short name for logs
    fn name(&self) -> &str;
}
