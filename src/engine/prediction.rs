//! Vote aggregation over stored pattern statistics.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::features::{FeatureKey, KeyGenerator};
use super::history::RollingHistory;
use super::round::{Dice, Outcome};
use crate::storage::{PatternStat, PatternStore};

/// Recommended action for the next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pick {
    #[serde(rename = "A")]
    Small,
    #[serde(rename = "B")]
    Big,
    #[serde(rename = "SKIP")]
    Skip,
}

impl From<Outcome> for Pick {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Small => Self::Small,
            Outcome::Big => Self::Big,
        }
    }
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Small => "A",
            Self::Big => "B",
            Self::Skip => "SKIP",
        })
    }
}

/// Basis of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No usable statistics yet.
    Cold,
    /// Too many weak signals; abstain.
    Danger,
    Normal,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cold => "cold",
            Self::Danger => "danger",
            Self::Normal => "normal",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub pick: Pick,
    pub confidence: f64,
    pub mode: Mode,
}

impl Prediction {
    #[must_use]
    pub const fn cold() -> Self {
        Self {
            pick: Pick::Small,
            confidence: 0.5,
            mode: Mode::Cold,
        }
    }

    #[must_use]
    pub const fn danger() -> Self {
        Self {
            pick: Pick::Skip,
            confidence: 0.0,
            mode: Mode::Danger,
        }
    }
}

/// One feature's opinion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub key: FeatureKey,
    pub pick: Outcome,
    pub confidence: f64,
    pub score: f64,
}

impl Vote {
    #[must_use]
    pub fn from_stat(key: FeatureKey, stat: &PatternStat) -> Self {
        let rate_small = stat.rate(Outcome::Small);
        let rate_big = stat.rate(Outcome::Big);
        let (pick, confidence) = if rate_big >= rate_small {
            (Outcome::Big, rate_big)
        } else {
            (Outcome::Small, rate_small)
        };
        Self {
            key,
            pick,
            confidence,
            score: confidence * stat.weight * stat.power,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRules {
    /// Rows with fewer observations are ignored.
    pub min_samples: u64,
    /// Votes below this confidence count towards risk.
    pub risk_confidence: f64,
    /// Abstain once this many risky votes are present.
    pub risk_votes: usize,
}

impl Default for PredictionRules {
    fn default() -> Self {
        Self {
            min_samples: 5,
            risk_confidence: 0.55,
            risk_votes: 3,
        }
    }
}

impl PredictionRules {
    /// Query the store for each key and keep the usable votes.
    ///
    /// Missing rows, rows under `min_samples` and failed reads are skipped.
    #[must_use]
    pub fn collect_votes(&self, store: &dyn PatternStore, keys: &[FeatureKey]) -> Vec<Vote> {
        let mut votes = Vec::with_capacity(keys.len());
        for key in keys {
            let stat = match store.fetch(key) {
                Ok(Some(stat)) => stat,
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        family = %key.family(),
                        value = %key.value(),
                        error = %err,
                        "pattern fetch failed, treating key as absent"
                    );
                    continue;
                }
            };
            if stat.total < self.min_samples {
                trace!(key = %key, total = stat.total, "below sample gate");
                continue;
            }
            votes.push(Vote::from_stat(*key, &stat));
        }
        votes
    }

    /// Combine votes into one decision.
    ///
    /// Aggregate score ties resolve to [`Outcome::Big`], matching the per-vote
    /// rule where equal rates pick `Big`.
    #[must_use]
    pub fn aggregate(&self, votes: &[Vote]) -> Prediction {
        if votes.is_empty() {
            return Prediction::cold();
        }

        let risk = votes
            .iter()
            .filter(|vote| vote.confidence < self.risk_confidence)
            .count();
        if risk >= self.risk_votes {
            return Prediction::danger();
        }

        let score_of = |label: Outcome| -> f64 {
            votes
                .iter()
                .filter(|vote| vote.pick == label)
                .map(|vote| vote.score)
                .sum()
        };
        let winner = if score_of(Outcome::Big) >= score_of(Outcome::Small) {
            Outcome::Big
        } else {
            Outcome::Small
        };

        let (count, total) = votes
            .iter()
            .filter(|vote| vote.pick == winner)
            .fold((0usize, 0.0f64), |(n, sum), vote| (n + 1, sum + vote.confidence));
        let confidence = if count == 0 { 0.0 } else { total / count as f64 };

        Prediction {
            pick: winner.into(),
            confidence,
            mode: Mode::Normal,
        }
    }
}

/// Predict the next round from `history` and the last observed `sum`.
///
/// Dice are unknown at this point, so the dice feature is generated from the
/// sentinel triple.
pub fn predict(
    store: &dyn PatternStore,
    keygen: &KeyGenerator,
    rules: &PredictionRules,
    history: &RollingHistory,
    sum: u8,
) -> Prediction {
    let keys = keygen.generate(history, sum, Dice::UNKNOWN);
    let votes = rules.collect_votes(store, &keys);
    rules.aggregate(&votes)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::engine::features::SumRange;
    use crate::storage::MemoryStore;

    fn vote(pick: Outcome, confidence: f64, score: f64) -> Vote {
        Vote {
            key: FeatureKey::Sum(10),
            pick,
            confidence,
            score,
        }
    }

    fn stat(wins_small: u64, wins_big: u64) -> PatternStat {
        PatternStat {
            total: wins_small + wins_big,
            wins_small,
            wins_big,
            weight: 1.0,
            power: 1.0,
            last_update: Utc::now(),
        }
    }

    #[test]
    fn no_votes_is_cold() {
        assert_eq!(PredictionRules::default().aggregate(&[]), Prediction::cold());
    }

    #[test]
    fn three_weak_votes_abstain_even_with_strong_ones() {
        let votes = [
            vote(Outcome::Big, 0.9, 5.0),
            vote(Outcome::Big, 0.52, 0.5),
            vote(Outcome::Small, 0.51, 0.5),
            vote(Outcome::Big, 0.54, 0.5),
        ];
        assert_eq!(PredictionRules::default().aggregate(&votes), Prediction::danger());
    }

    #[test]
    fn two_weak_votes_still_decide() {
        let votes = [
            vote(Outcome::Small, 0.8, 2.0),
            vote(Outcome::Small, 0.6, 1.0),
            vote(Outcome::Big, 0.52, 0.5),
            vote(Outcome::Big, 0.54, 0.5),
        ];
        let prediction = PredictionRules::default().aggregate(&votes);
        assert_eq!(prediction.pick, Pick::Small);
        assert_eq!(prediction.mode, Mode::Normal);
        assert!((prediction.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn score_not_count_picks_winner() {
        let votes = [
            vote(Outcome::Small, 0.6, 0.2),
            vote(Outcome::Small, 0.6, 0.2),
            vote(Outcome::Big, 0.9, 3.0),
        ];
        let prediction = PredictionRules::default().aggregate(&votes);
        assert_eq!(prediction.pick, Pick::Big);
        assert!((prediction.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn equal_scores_resolve_to_big() {
        let votes = [vote(Outcome::Small, 0.7, 1.0), vote(Outcome::Big, 0.6, 1.0)];
        let prediction = PredictionRules::default().aggregate(&votes);
        assert_eq!(prediction.pick, Pick::Big);
        assert!((prediction.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn vote_prefers_big_on_equal_rates() {
        let v = Vote::from_stat(FeatureKey::Parity(0), &stat(5, 5));
        assert_eq!(v.pick, Outcome::Big);
        assert!((v.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sample_gate_skips_thin_rows() {
        let store = MemoryStore::new();
        store.seed(&FeatureKey::Sum(0), stat(0, 4));
        let votes = PredictionRules::default().collect_votes(&store, &[FeatureKey::Sum(0)]);
        assert!(votes.is_empty());

        store.seed(&FeatureKey::Sum(0), stat(0, 5));
        let votes = PredictionRules::default().collect_votes(&store, &[FeatureKey::Sum(0)]);
        assert_eq!(votes.len(), 1);
    }

    #[test]
    fn single_strong_key_predicts_normally() {
        let store = MemoryStore::new();
        store.seed(&FeatureKey::Range(SumRange::Low), stat(2, 8));
        let prediction = predict(
            &store,
            &KeyGenerator::default(),
            &PredictionRules::default(),
            &RollingHistory::new(200),
            0,
        );
        assert_eq!(prediction.pick, Pick::Big);
        assert_eq!(prediction.mode, Mode::Normal);
        assert!((prediction.confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn prediction_serializes_for_dashboard() {
        let json = serde_json::to_value(Prediction::danger()).unwrap();
        assert_eq!(json["pick"], "SKIP");
        assert_eq!(json["mode"], "danger");
    }
}
