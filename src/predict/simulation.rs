//! Local simulation backend for offline and demo use
//!
//! Picks `k` rounds of point mutations, each one a guaranteed substitution
//! at a random position. Rounds may hit the same position again, and a later
//! round may restore the original base; the change indicator is computed
//! once from the final sequence, so such a position is not marked.

use super::{PredictionBackend, PredictionError, PredictionRequest, PredictionResult};
use crate::sequence::{Base, Sequence, SEQUENCE_LENGTH};
use async_trait::async_trait;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::time::{self, Duration};

/// Knobs for the simulated predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationRules {
    /// Fewest mutation rounds per prediction
    pub min_mutations: usize,
    /// Most mutation rounds per prediction
    pub max_mutations: usize,
    /// Lowest efficiency score reported
    pub min_efficiency: u8,
    /// Highest efficiency score reported
    pub max_efficiency: u8,
    /// Artificial latency before answering, in milliseconds
    pub delay_ms: u64,
}

impl Default for SimulationRules {
    fn default() -> Self {
        Self {
            min_mutations: 2,
            max_mutations: 3,
            min_efficiency: 60,
            max_efficiency: 100,
            delay_ms: 0,
        }
    }
}

impl SimulationRules {
    /// Default rules with the latency of a real round-trip, for demos
    pub fn demo() -> Self {
        Self {
            delay_ms: 1500,
            ..Self::default()
        }
    }

    /// Check that the ranges are non-empty and the efficiency fits in 0..=100
    pub fn check(&self) -> Result<(), String> {
        if self.min_mutations == 0 {
            return Err("min_mutations must be at least 1".to_string());
        }
        if self.min_mutations > self.max_mutations {
            return Err(format!(
                "min_mutations ({}) exceeds max_mutations ({})",
                self.min_mutations, self.max_mutations
            ));
        }
        if self.min_efficiency > self.max_efficiency {
            return Err(format!(
                "min_efficiency ({}) exceeds max_efficiency ({})",
                self.min_efficiency, self.max_efficiency
            ));
        }
        if self.max_efficiency > 100 {
            return Err(format!("max_efficiency ({}) exceeds 100", self.max_efficiency));
        }
        Ok(())
    }
}

/// One substitution applied during simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRound {
    pub position: usize,
    pub from: Base,
    pub to: Base,
}

/// Apply `rounds` random substitutions to `sequence`.
///
/// Every round replaces the base currently at the chosen position with one
/// of the other three, so no round is a no-op.
pub fn mutate<R: Rng + ?Sized>(
    sequence: &Sequence,
    rounds: usize,
    rng: &mut R,
) -> (Sequence, Vec<MutationRound>) {
    let mut bases = *sequence.bases();
    let mut log = Vec::with_capacity(rounds);
    for _ in 0..rounds {
        let position = rng.gen_range(0..SEQUENCE_LENGTH);
        let from = bases[position];
        let alternatives = from.alternatives();
        let to = alternatives[rng.gen_range(0..alternatives.len())];
        bases[position] = to;
        log.push(MutationRound { position, from, to });
    }
    (Sequence::from_bases(bases), log)
}

/// Produce a simulated prediction for `sequence`
pub fn simulate_edit<R: Rng + ?Sized>(
    sequence: &Sequence,
    rules: &SimulationRules,
    rng: &mut R,
) -> PredictionResult {
    let max_mutations = rules.max_mutations.max(rules.min_mutations);
    let k = rng.gen_range(rules.min_mutations..=max_mutations);
    let (edited, rounds) = mutate(sequence, k, &mut *rng);
    for round in &rounds {
        debug!("Mutation at {}: {} -> {}", round.position, round.from, round.to);
    }

    let max_efficiency = rules.max_efficiency.max(rules.min_efficiency);
    let efficiency = rng.gen_range(rules.min_efficiency..=max_efficiency);

    let result = PredictionResult::from_sequences(sequence, &edited, f64::from(efficiency));
    let message = match result.changed_count() {
        0 => format!("Simulated {} edit(s) cancelled out; sequence unchanged", k),
        n => format!("Simulated {} base change(s) with {}% predicted efficiency", n, efficiency),
    };
    result.with_message(message)
}

/// Offline backend that fabricates plausible predictions
pub struct LocalSimulation {
    pub rules: SimulationRules,
    rng: Mutex<StdRng>,
}

impl LocalSimulation {
    pub fn new(rules: SimulationRules) -> Self {
        Self {
            rules,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic simulation, for tests and reproducible demos
    pub fn with_seed(rules: SimulationRules, seed: u64) -> Self {
        Self {
            rules,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl PredictionBackend for LocalSimulation {
    async fn predict(&self, request: PredictionRequest) -> Result<PredictionResult, PredictionError> {
        if self.rules.delay_ms > 0 {
            time::sleep(Duration::from_millis(self.rules.delay_ms)).await;
        }
        let result = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| PredictionError::Internal("simulation RNG lock poisoned".to_string()))?;
            simulate_edit(&request.sequence, &self.rules, &mut *rng)
        };
        info!("Simulated prediction {}: {}", request.id, result.summary());
        Ok(result)
    }

    fn name(&self) -> &str {
        "local-simulation"
    }
}
