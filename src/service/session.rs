//! PredictionService: one submission at a time, newest wins
//!
//! Each call to `submit` runs the cycle
//! `Validating -> (Invalid | Validated -> Predicting -> (Failed | Completed))`.
//!
//! Overlapping submissions are resolved by cancel-and-replace. Every
//! submission takes a generation number; starting a new one aborts the
//! in-flight prediction of the previous one, which then returns
//! `SubmitError::Superseded`. A response that arrives for an old
//! generation is dropped without touching the session.
//!
//! A failure never clears the last successful result: the view keeps
//! showing it next to the new error.

use super::config::{ConfigError, ServiceConfig};
use crate::predict::{EditContext, PredictionBackend, PredictionError, PredictionRequest, PredictionResult};
use crate::sequence::{validate, ValidationError};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tokio::time;

/// Where the current (newest) submission is in its cycle
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Validating,
    Invalid(ValidationError),
    Validated,
    Predicting,
    Failed(PredictionError),
    Completed,
}

impl Phase {
    /// Terminal phases end a submission's cycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Invalid(_) | Phase::Failed(_) | Phase::Completed)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Validating | Phase::Validated | Phase::Predicting)
    }
}

/// Snapshot of the session for rendering
#[derive(Debug, Clone)]
pub struct SessionView {
    /// Generation of the newest submission; 0 before the first
    pub generation: u64,
    pub phase: Phase,
    /// Most recent successful result, kept across later failures
    pub last_result: Option<Arc<PredictionResult>>,
}

impl SessionView {
    /// The user-facing error for the current phase, if any
    pub fn error_message(&self) -> Option<String> {
        match &self.phase {
            Phase::Invalid(e) => Some(e.to_string()),
            Phase::Failed(e) => Some(e.user_message()),
            _ => None,
        }
    }
}

/// What a submission can end with besides a result
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Failed(#[from] PredictionError),

    #[error("Submission {generation} was superseded by a newer one")]
    Superseded { generation: u64 },
}

struct SessionState {
    generation: u64,
    phase: Phase,
    last_result: Option<Arc<PredictionResult>>,
}

/// Aborts a spawned prediction if the submitting future goes away
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Validates input, runs the configured backend, and tracks session state
pub struct PredictionService {
    backend: Arc<dyn PredictionBackend>,
    timeout: Option<Duration>,
    state: Mutex<SessionState>,
    generation: watch::Sender<u64>,
}

impl PredictionService {
    pub fn new(backend: Arc<dyn PredictionBackend>, timeout: Option<Duration>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            backend,
            timeout,
            state: Mutex::new(SessionState {
                generation: 0,
                phase: Phase::Idle,
                last_result: None,
            }),
            generation,
        }
    }

    /// Validate the config and build the backend it selects
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let backend = config.backend.build();
        info!("Prediction service using '{}' backend", backend.name());
        Ok(Self::new(backend, config.timeout()))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn view(&self) -> SessionView {
        let state = self.state.lock().await;
        SessionView {
            generation: state.generation,
            phase: state.phase.clone(),
            last_result: state.last_result.clone(),
        }
    }

    /// Submit raw user input with no extra context
    pub async fn submit(&self, input: &str) -> Result<Arc<PredictionResult>, SubmitError> {
        self.submit_with(input, EditContext::default()).await
    }

    /// Submit raw user input, passing `context` through to the backend
    pub async fn submit_with(
        &self,
        input: &str,
        context: EditContext,
    ) -> Result<Arc<PredictionResult>, SubmitError> {
        let mut generation = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        let mut newer = self.generation.subscribe();

        if !self.begin(generation).await {
            return Err(SubmitError::Superseded { generation });
        }

        let sequence = match validate(input) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!("Submission {} rejected: {}", generation, e);
                self.advance(generation, Phase::Invalid(e.clone())).await;
                return Err(e.into());
            }
        };

        if !self.advance(generation, Phase::Validated).await {
            return Err(SubmitError::Superseded { generation });
        }
        let request = PredictionRequest::new(sequence).with_context(context);
        info!(
            "Submission {} accepted: {} via '{}' (request {})",
            generation,
            sequence,
            self.backend.name(),
            request.id
        );
        if !self.advance(generation, Phase::Predicting).await {
            return Err(SubmitError::Superseded { generation });
        }

        let backend = Arc::clone(&self.backend);
        let task = tokio::spawn(async move { backend.predict(request).await });
        let _guard = AbortOnDrop(task.abort_handle());
        let prediction = Self::await_prediction(task, self.timeout);

        let outcome = tokio::select! {
            biased;
            outcome = prediction => outcome,
            _ = Self::superseded(&mut newer, generation) => {
                info!("Submission {} cancelled by a newer submission", generation);
                return Err(SubmitError::Superseded { generation });
            }
        };

        self.finish(generation, outcome).await
    }

    /// Commit `outcome` unless a newer submission has been issued meanwhile.
    ///
    /// The watch counter moves before the newer submission takes the state
    /// lock, so both are checked.
    async fn finish(
        &self,
        generation: u64,
        outcome: Result<PredictionResult, PredictionError>,
    ) -> Result<Arc<PredictionResult>, SubmitError> {
        let mut state = self.state.lock().await;
        if state.generation != generation || *self.generation.borrow() != generation {
            info!("Discarding stale response for submission {}", generation);
            return Err(SubmitError::Superseded { generation });
        }
        match outcome {
            Ok(result) => {
                let result = Arc::new(result);
                info!("Submission {} completed: {}", generation, result.summary());
                state.phase = Phase::Completed;
                state.last_result = Some(Arc::clone(&result));
                Ok(result)
            }
            Err(e) => {
                warn!("Submission {} failed: {}", generation, e);
                state.phase = Phase::Failed(e.clone());
                Err(e.into())
            }
        }
    }

    /// Join the prediction task, applying the timeout and normalizing panics
    async fn await_prediction(
        task: tokio::task::JoinHandle<Result<PredictionResult, PredictionError>>,
        timeout: Option<Duration>,
    ) -> Result<PredictionResult, PredictionError> {
        let abort = task.abort_handle();
        let joined = match timeout {
            Some(limit) => match time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    return Err(PredictionError::Timeout(limit));
                }
            },
            None => task.await,
        };
        joined.unwrap_or_else(|e| {
            let detail = if e.is_panic() { "backend panicked" } else { "backend task cancelled" };
            Err(PredictionError::Internal(detail.to_string()))
        })
    }

    /// Resolves once a generation newer than `generation` has been issued
    async fn superseded(newer: &mut watch::Receiver<u64>, generation: u64) {
        loop {
            if *newer.borrow_and_update() != generation {
                return;
            }
            if newer.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }

    /// Start a new cycle unless a newer submission already owns the session
    async fn begin(&self, generation: u64) -> bool {
        let mut state = self.state.lock().await;
        if generation < state.generation {
            return false;
        }
        state.generation = generation;
        state.phase = Phase::Validating;
        true
    }

    /// Move to `phase` if `generation` still owns the session
    async fn advance(&self, generation: u64, phase: Phase) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return false;
        }
        state.phase = phase;
        true
    }
}
