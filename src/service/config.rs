//! Service configuration
//!
//! Selects the prediction strategy and the per-call timeout. Loaded from a
//! JSON file, optionally overridden from the environment, and validated
//! before a service is built from it.

use crate::predict::{LocalSimulation, PredictionBackend, RemoteBackend, RemoteEndpoint, SimulationRules};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Points the service at a remote predictor
pub const ENV_PREDICT_URL: &str = "GENEFORGE_PREDICT_URL";
/// Overrides the remote route, e.g. `/api/predict`
pub const ENV_PREDICT_ROUTE: &str = "GENEFORGE_PREDICT_ROUTE";
/// Overrides the timeout; `0` is rejected, `none` disables it
pub const ENV_TIMEOUT_SECS: &str = "GENEFORGE_TIMEOUT_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
}

/// Which prediction strategy to construct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Offline random mutations
    Simulation {
        #[serde(default)]
        rules: SimulationRules,
        /// Fixed RNG seed for reproducible output
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
    /// HTTP model server
    Remote {
        #[serde(default)]
        endpoint: RemoteEndpoint,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Simulation {
            rules: SimulationRules::default(),
            seed: None,
        }
    }
}

impl BackendConfig {
    /// Construct the backend this config describes
    pub fn build(&self) -> Arc<dyn PredictionBackend> {
        match self {
            BackendConfig::Simulation { rules, seed: Some(seed) } => {
                Arc::new(LocalSimulation::with_seed(rules.clone(), *seed))
            }
            BackendConfig::Simulation { rules, seed: None } => Arc::new(LocalSimulation::new(rules.clone())),
            BackendConfig::Remote { endpoint } => Arc::new(RemoteBackend::new(endpoint.clone())),
        }
    }
}

/// Top-level configuration for a [`super::PredictionService`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub backend: BackendConfig,
    /// Limit on a single prediction call; `None` waits forever
    pub timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            timeout_secs: Some(10),
        }
    }
}

impl ServiceConfig {
    /// Remote strategy against `endpoint`, default timeout
    pub fn remote(endpoint: RemoteEndpoint) -> Self {
        Self {
            backend: BackendConfig::Remote { endpoint },
            ..Self::default()
        }
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        info!("Loaded service config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Switch to the remote strategy at `url`.
    ///
    /// Retry settings survive if the config was already remote.
    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        let mut endpoint = match self.backend {
            BackendConfig::Remote { endpoint } => endpoint,
            BackendConfig::Simulation { .. } => RemoteEndpoint::default(),
        };
        endpoint.base_url = url.into();
        self.backend = BackendConfig::Remote { endpoint };
        self
    }

    /// Change the predict route; only meaningful for the remote strategy
    pub fn with_route(mut self, route: impl Into<String>) -> Result<Self, ConfigError> {
        match &mut self.backend {
            BackendConfig::Remote { endpoint } => endpoint.route = route.into(),
            BackendConfig::Simulation { .. } => {
                return Err(ConfigError::Invalid(
                    "a predict route needs the remote backend".to_string(),
                ))
            }
        }
        Ok(self)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_PREDICT_URL) {
            self = self.with_remote_url(url);
        }
        if let Some(route) = lookup(ENV_PREDICT_ROUTE) {
            self = self.with_route(route)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = if raw.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    key: ENV_TIMEOUT_SECS.to_string(),
                    value: raw.clone(),
                })?)
            };
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        match &self.backend {
            BackendConfig::Simulation { rules, .. } => rules.check().map_err(ConfigError::Invalid),
            BackendConfig::Remote { endpoint } => {
                if endpoint.base_url.trim().is_empty() {
                    return Err(ConfigError::Invalid("remote base_url is empty".to_string()));
                }
                Ok(())
            }
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
