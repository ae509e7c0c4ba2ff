//! Prediction service: configuration plus the request/response session

mod config;
mod session;

pub use config::{BackendConfig, ConfigError, ServiceConfig, ENV_PREDICT_ROUTE, ENV_PREDICT_URL, ENV_TIMEOUT_SECS};
pub use session::{Phase, PredictionService, SessionView, SubmitError};
