//! Round primitives: dice, sums and the two-valued outcome.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sums at or above this value resolve to [`Outcome::Big`].
pub const DEFAULT_OUTCOME_THRESHOLD: u8 = 11;

/// The two mutually exclusive round results.
///
/// `Small` is label A (sum at most 10), `Big` is label B (sum 11 and up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "A")]
    Small,
    #[serde(rename = "B")]
    Big,
}

impl Outcome {
    /// Resolve a sum against the outcome threshold.
    #[must_use]
    pub const fn from_sum(sum: u8, threshold: u8) -> Self {
        if sum >= threshold { Self::Big } else { Self::Small }
    }

    /// Short label used in stored keys and wire output.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Small => "A",
            Self::Big => "B",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Three die faces as delivered by the feed.
///
/// [`Dice::UNKNOWN`] (`0-0-0`) stands in when the faces are not known yet,
/// which is always the case at prediction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dice(pub [u8; 3]);

impl Dice {
    pub const UNKNOWN: Self = Self([0, 0, 0]);

    #[must_use]
    pub const fn new(d1: u8, d2: u8, d3: u8) -> Self {
        Self([d1, d2, d3])
    }

    #[must_use]
    pub const fn sum(self) -> u8 {
        self.0[0] + self.0[1] + self.0[2]
    }

    /// Faces in ascending order.
    #[must_use]
    pub fn sorted(self) -> [u8; 3] {
        let mut faces = self.0;
        faces.sort_unstable();
        faces
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0.iter().all(|face| (1..=6).contains(face))
    }
}

impl Default for Dice {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// One resolved round. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub sum: u8,
    pub outcome: Outcome,
}

impl RoundOutcome {
    #[must_use]
    pub const fn from_sum(sum: u8, threshold: u8) -> Self {
        Self {
            sum,
            outcome: Outcome::from_sum(sum, threshold),
        }
    }

    #[must_use]
    pub const fn from_dice(dice: Dice, threshold: u8) -> Self {
        Self::from_sum(dice.sum(), threshold)
    }
}
