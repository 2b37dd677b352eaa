//! Adaptive pattern-scoring engine.
//!
//! Round-outcome events append to the rolling history and drive the learning
//! update; predict requests drive the vote aggregator. Both paths share one
//! key generator and one store. The state lock is only held to snapshot or
//! mutate history, never across a store call.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub mod features;
pub mod history;
pub mod learning;
pub mod prediction;
pub mod round;

pub use features::{Family, FeatureKey, KeyGenerator, SumRange};
pub use history::{DEFAULT_HISTORY_CAP, RollingHistory};
pub use learning::{LearnReport, LearningRules, ReliabilityRule};
pub use prediction::{Mode, Pick, Prediction, PredictionRules, Vote};
pub use round::{DEFAULT_OUTCOME_THRESHOLD, Dice, Outcome, RoundOutcome};

use crate::storage::PatternStore;

/// Engine tunables. Defaults reproduce the reference scoring behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history_cap: usize,
    pub outcome_threshold: u8,
    pub trend_window: usize,
    pub trend_min: usize,
    pub min_samples: u64,
    pub risk_confidence: f64,
    pub risk_votes: usize,
    pub floor: f64,
    pub weight: ReliabilityRule,
    pub power: ReliabilityRule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            outcome_threshold: DEFAULT_OUTCOME_THRESHOLD,
            trend_window: 6,
            trend_min: 4,
            min_samples: 5,
            risk_confidence: 0.55,
            risk_votes: 3,
            floor: learning::DEFAULT_FLOOR,
            weight: ReliabilityRule::WEIGHT,
            power: ReliabilityRule::POWER,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn key_generator(&self) -> KeyGenerator {
        KeyGenerator {
            range_threshold: self.outcome_threshold,
            trend_window: self.trend_window,
            trend_min: self.trend_min,
        }
    }

    #[must_use]
    pub const fn learning_rules(&self) -> LearningRules {
        LearningRules {
            weight: self.weight,
            power: self.power,
            floor: self.floor,
        }
    }

    #[must_use]
    pub const fn prediction_rules(&self) -> PredictionRules {
        PredictionRules {
            min_samples: self.min_samples,
            risk_confidence: self.risk_confidence,
            risk_votes: self.risk_votes,
        }
    }
}

/// Emitted to the dashboard after each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub sequence_id: u64,
    pub sum: u8,
    pub outcome: Outcome,
}

/// Point-in-time copy of the engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub history: RollingHistory,
    pub last_sum: u8,
    pub sequence: u64,
}

/// Rolling history, last observed sum and round counter of one engine.
#[derive(Debug, Clone)]
pub struct EngineState {
    history: RollingHistory,
    last_sum: u8,
    sequence: u64,
}

impl EngineState {
    #[must_use]
    pub fn new(history_cap: usize) -> Self {
        Self {
            history: RollingHistory::new(history_cap),
            last_sum: 0,
            sequence: 0,
        }
    }

    /// Append a resolved round and return its sequence id (starting at 1).
    pub fn record_outcome(&mut self, round: RoundOutcome) -> u64 {
        self.history.push(round);
        self.last_sum = round.sum;
        self.sequence += 1;
        self.sequence
    }

    #[must_use]
    pub fn current_snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            history: self.history.clone(),
            last_sum: self.last_sum,
            sequence: self.sequence,
        }
    }
}

pub struct Engine {
    store: Arc<dyn PatternStore>,
    state: Mutex<EngineState>,
    config: EngineConfig,
    keygen: KeyGenerator,
    learning: LearningRules,
    prediction: PredictionRules,
}

impl Engine {
    #[must_use]
    pub fn new(store: Arc<dyn PatternStore>, config: EngineConfig) -> Self {
        Self {
            store,
            state: Mutex::new(EngineState::new(config.history_cap)),
            keygen: config.key_generator(),
            learning: config.learning_rules(),
            prediction: config.prediction_rules(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn PatternStore> {
        &self.store
    }

    /// Record a resolved round and learn from it.
    ///
    /// Learning runs against the history as it stood before this round.
    /// Store failures degrade to partial learning and are only logged.
    pub fn record_round(&self, dice: Dice) -> RoundSummary {
        let round = RoundOutcome::from_dice(dice, self.config.outcome_threshold);

        let (before, sequence_id) = {
            let mut state = self.state.lock();
            let before = state.history.clone();
            let sequence_id = state.record_outcome(round);
            (before, sequence_id)
        };

        let report = learning::learn(
            self.store.as_ref(),
            &self.keygen,
            &self.learning,
            &before,
            round,
            dice,
        );

        info!(
            sequence_id,
            sum = round.sum,
            outcome = %round.outcome,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "round recorded"
        );

        RoundSummary {
            sequence_id,
            sum: round.sum,
            outcome: round.outcome,
        }
    }

    /// Predict the next round from the current history and last sum.
    pub fn predict(&self) -> Prediction {
        let snapshot = self.snapshot();
        let prediction = prediction::predict(
            self.store.as_ref(),
            &self.keygen,
            &self.prediction,
            &snapshot.history,
            snapshot.last_sum,
        );
        debug!(
            pick = %prediction.pick,
            confidence = prediction.confidence,
            mode = %prediction.mode,
            history = snapshot.history.len(),
            "prediction computed"
        );
        prediction
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        self.state.lock().current_snapshot()
    }
}
