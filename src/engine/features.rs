//! Feature key derivation.
//!
//! Every round (or prediction request) is described by a small, ordered set of
//! pattern dimensions. Keys are typed here and only flattened to a
//! `(family, value)` string pair when they reach the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::history::RollingHistory;
use super::round::{Dice, Outcome};
use crate::error::DpeError;

/// Pattern dimension a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Sum,
    Range,
    Parity,
    Dice,
    Trend6,
    Streak,
    Hybrid,
}

impl Family {
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Sum,
            Self::Range,
            Self::Parity,
            Self::Dice,
            Self::Trend6,
            Self::Streak,
            Self::Hybrid,
        ]
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Range => "range",
            Self::Parity => "parity",
            Self::Dice => "dice",
            Self::Trend6 => "trend6",
            Self::Streak => "streak",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = DpeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|family| family.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                DpeError::Config(format!(
                    "unknown feature family {s} (expected sum|range|parity|dice|trend6|streak|hybrid)"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SumRange {
    Low,
    High,
}

/// One pattern dimension with its typed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    Sum(u8),
    Range(SumRange),
    Parity(u8),
    /// Faces sorted ascending; `[0, 0, 0]` when the dice are unknown.
    Dice([u8; 3]),
    Trend6 { trending: bool },
    Streak { last: Outcome, len: usize },
    Hybrid { last: Outcome, parity: u8 },
}

impl FeatureKey {
    #[must_use]
    pub const fn family(&self) -> Family {
        match self {
            Self::Sum(_) => Family::Sum,
            Self::Range(_) => Family::Range,
            Self::Parity(_) => Family::Parity,
            Self::Dice(_) => Family::Dice,
            Self::Trend6 { .. } => Family::Trend6,
            Self::Streak { .. } => Family::Streak,
            Self::Hybrid { .. } => Family::Hybrid,
        }
    }

    /// Stable string form of the payload, used as the store's `value` column.
    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Self::Sum(sum) => sum.to_string(),
            Self::Range(SumRange::Low) => "LOW".to_string(),
            Self::Range(SumRange::High) => "HIGH".to_string(),
            Self::Parity(parity) => parity.to_string(),
            Self::Dice([a, b, c]) => format!("{a}-{b}-{c}"),
            Self::Trend6 { trending: true } => "TREND".to_string(),
            Self::Trend6 { trending: false } => "NOTREND".to_string(),
            Self::Streak { last, len } => format!("{last}:{len}"),
            Self::Hybrid { last, parity } => format!("{last}:{parity}"),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.family(), self.value())
    }
}

/// Derives feature keys from history and the current round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyGenerator {
    /// Sums strictly below this are `LOW`.
    pub range_threshold: u8,
    pub trend_window: usize,
    /// Big outcomes within the window needed to flag a trend.
    pub trend_min: usize,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self {
            range_threshold: super::round::DEFAULT_OUTCOME_THRESHOLD,
            trend_window: 6,
            trend_min: 4,
        }
    }
}

impl KeyGenerator {
    /// Keys in a fixed order: sum, range, parity, dice, then trend6 (history of
    /// at least `trend_window` rounds), then streak and hybrid (non-empty history).
    #[must_use]
    pub fn generate(&self, history: &RollingHistory, sum: u8, dice: Dice) -> Vec<FeatureKey> {
        let parity = sum % 2;
        let range = if sum < self.range_threshold {
            SumRange::Low
        } else {
            SumRange::High
        };

        let mut keys = Vec::with_capacity(7);
        keys.push(FeatureKey::Sum(sum));
        keys.push(FeatureKey::Range(range));
        keys.push(FeatureKey::Parity(parity));
        keys.push(FeatureKey::Dice(dice.sorted()));

        if history.len() >= self.trend_window {
            let big = history
                .tail(self.trend_window)
                .filter(|round| round.outcome == Outcome::Big)
                .count();
            keys.push(FeatureKey::Trend6 {
                trending: big >= self.trend_min,
            });
        }

        if let Some((last, len)) = history.streak() {
            keys.push(FeatureKey::Streak { last, len });
            keys.push(FeatureKey::Hybrid { last, parity });
        }

        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::round::{DEFAULT_OUTCOME_THRESHOLD, RoundOutcome};

    fn history(sums: &[u8]) -> RollingHistory {
        RollingHistory::from_rounds(
            200,
            sums.iter()
                .map(|sum| RoundOutcome::from_sum(*sum, DEFAULT_OUTCOME_THRESHOLD)),
        )
    }

    #[test]
    fn empty_history_yields_base_keys() {
        let keys = KeyGenerator::default().generate(&history(&[]), 12, Dice::new(6, 2, 4));
        assert_eq!(
            keys,
            vec![
                FeatureKey::Sum(12),
                FeatureKey::Range(SumRange::High),
                FeatureKey::Parity(0),
                FeatureKey::Dice([2, 4, 6]),
            ]
        );
    }

    #[test]
    fn range_boundary_is_ten() {
        let keygen = KeyGenerator::default();
        let at_ten = keygen.generate(&history(&[]), 10, Dice::UNKNOWN);
        let at_eleven = keygen.generate(&history(&[]), 11, Dice::UNKNOWN);
        assert_eq!(at_ten[1], FeatureKey::Range(SumRange::Low));
        assert_eq!(at_eleven[1], FeatureKey::Range(SumRange::High));
    }

    #[test]
    fn streak_and_hybrid_follow_history_tail() {
        let keys = KeyGenerator::default().generate(&history(&[4, 12, 13, 11]), 7, Dice::UNKNOWN);
        assert_eq!(keys.len(), 6);
        assert_eq!(
            keys[4],
            FeatureKey::Streak {
                last: Outcome::Big,
                len: 3
            }
        );
        assert_eq!(
            keys[5],
            FeatureKey::Hybrid {
                last: Outcome::Big,
                parity: 1
            }
        );
    }

    #[test]
    fn trend_requires_six_rounds() {
        let keygen = KeyGenerator::default();
        let five = keygen.generate(&history(&[12, 12, 12, 12, 12]), 9, Dice::UNKNOWN);
        assert!(five.iter().all(|k| k.family() != Family::Trend6));

        let six = keygen.generate(&history(&[4, 4, 12, 12, 12, 12]), 9, Dice::UNKNOWN);
        assert_eq!(six[4], FeatureKey::Trend6 { trending: true });

        let weak = keygen.generate(&history(&[4, 4, 4, 12, 12, 12]), 9, Dice::UNKNOWN);
        assert_eq!(weak[4], FeatureKey::Trend6 { trending: false });
    }

    #[test]
    fn trend_only_looks_at_last_window() {
        let keys = KeyGenerator::default().generate(
            &history(&[12, 12, 12, 12, 4, 4, 4, 4, 4, 4]),
            9,
            Dice::UNKNOWN,
        );
        assert_eq!(keys[4], FeatureKey::Trend6 { trending: false });
    }

    #[test]
    fn unknown_dice_collapse_to_constant_key() {
        let keygen = KeyGenerator::default();
        let a = keygen.generate(&history(&[]), 5, Dice::UNKNOWN);
        let b = keygen.generate(&history(&[]), 14, Dice::UNKNOWN);
        assert_eq!(a[3], b[3]);
        assert_eq!(a[3].value(), "0-0-0");
    }

    #[test]
    fn store_values_are_stable() {
        let cases = [
            (FeatureKey::Sum(17), "sum", "17"),
            (FeatureKey::Range(SumRange::Low), "range", "LOW"),
            (FeatureKey::Parity(1), "parity", "1"),
            (FeatureKey::Dice([1, 1, 6]), "dice", "1-1-6"),
            (FeatureKey::Trend6 { trending: false }, "trend6", "NOTREND"),
            (
                FeatureKey::Streak {
                    last: Outcome::Small,
                    len: 2,
                },
                "streak",
                "A:2",
            ),
            (
                FeatureKey::Hybrid {
                    last: Outcome::Big,
                    parity: 0,
                },
                "hybrid",
                "B:0",
            ),
        ];
        for (key, family, value) in cases {
            assert_eq!(key.family().as_str(), family);
            assert_eq!(key.value(), value);
        }
    }

    #[test]
    fn family_parses_case_insensitively() {
        assert_eq!("Trend6".parse::<Family>().unwrap(), Family::Trend6);
        assert!("bogus".parse::<Family>().is_err());
    }
}
