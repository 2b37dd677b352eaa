//! Online reliability learning.
//!
//! Each observed round updates the counters of every feature key derived from
//! the history as it stood before the round. Two decayed multipliers track how
//! often a key's majority label already agreed with what happened: `weight`
//! reacts quickly, `power` decays slower.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::features::{FeatureKey, KeyGenerator};
use super::history::RollingHistory;
use super::round::{Dice, Outcome, RoundOutcome};
use crate::storage::{PatternStat, PatternStore};

/// Decay-and-step rule for one reliability multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityRule {
    pub decay: f64,
    pub reward: f64,
    pub penalty: f64,
}

impl ReliabilityRule {
    pub const WEIGHT: Self = Self {
        decay: 0.9,
        reward: 0.5,
        penalty: 0.25,
    };

    pub const POWER: Self = Self {
        decay: 0.94,
        reward: 0.35,
        penalty: 0.2,
    };

    #[must_use]
    pub fn apply(self, current: f64, correct: bool, floor: f64) -> f64 {
        let step = if correct { self.reward } else { -self.penalty };
        current.mul_add(self.decay, step).max(floor)
    }
}

pub const DEFAULT_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRules {
    pub weight: ReliabilityRule,
    pub power: ReliabilityRule,
    pub floor: f64,
}

impl Default for LearningRules {
    fn default() -> Self {
        Self {
            weight: ReliabilityRule::WEIGHT,
            power: ReliabilityRule::POWER,
            floor: DEFAULT_FLOOR,
        }
    }
}

impl LearningRules {
    /// Row transition for one observation of `outcome`.
    #[must_use]
    pub fn next_stat(
        &self,
        prev: Option<PatternStat>,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> PatternStat {
        let Some(prev) = prev else {
            return PatternStat::first(outcome, now);
        };

        let correct = prev.agrees_with(outcome);
        let (wins_small, wins_big) = match outcome {
            Outcome::Small => (prev.wins_small + 1, prev.wins_big),
            Outcome::Big => (prev.wins_small, prev.wins_big + 1),
        };

        PatternStat {
            total: prev.total + 1,
            wins_small,
            wins_big,
            weight: self.weight.apply(prev.weight, correct, self.floor),
            power: self.power.apply(prev.power, correct, self.floor),
            last_update: now,
        }
    }
}

/// What a learning pass did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LearnReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Feed one observed round into the store.
///
/// `history` must not yet contain `round`. A store failure on one key is
/// logged and the remaining keys are still processed.
pub fn learn(
    store: &dyn PatternStore,
    keygen: &KeyGenerator,
    rules: &LearningRules,
    history: &RollingHistory,
    round: RoundOutcome,
    dice: Dice,
) -> LearnReport {
    let keys = keygen.generate(history, round.sum, dice);
    learn_keys(store, rules, &keys, round.outcome, Utc::now())
}

/// Apply one observation of `outcome` to each of `keys`.
pub fn learn_keys(
    store: &dyn PatternStore,
    rules: &LearningRules,
    keys: &[FeatureKey],
    outcome: Outcome,
    now: DateTime<Utc>,
) -> LearnReport {
    let mut report = LearnReport::default();

    for key in keys {
        let mut created = false;
        let result = store.upsert(key, &mut |prev| {
            created = prev.is_none();
            rules.next_stat(prev, outcome, now)
        });

        match result {
            Ok(_) if created => report.created += 1,
            Ok(_) => report.updated += 1,
            Err(err) => {
                report.failed += 1;
                warn!(
                    family = %key.family(),
                    value = %key.value(),
                    error = %err,
                    "pattern update failed, skipping key"
                );
            }
        }
    }

    debug!(
        outcome = %outcome,
        created = report.created,
        updated = report.updated,
        failed = report.failed,
        "learning pass complete"
    );
    report
}
