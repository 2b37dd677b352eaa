//! Bounded chronological record of recent rounds.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::round::{Outcome, RoundOutcome};

pub const DEFAULT_HISTORY_CAP: usize = 200;

/// Append-only at the tail; the oldest entry is evicted once `cap` is exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingHistory {
    entries: VecDeque<RoundOutcome>,
    cap: usize,
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl RollingHistory {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            entries: VecDeque::with_capacity(cap + 1),
            cap,
        }
    }

    /// Build a history from rounds in chronological order.
    #[must_use]
    pub fn from_rounds(cap: usize, rounds: impl IntoIterator<Item = RoundOutcome>) -> Self {
        let mut history = Self::new(cap);
        for round in rounds {
            history.push(round);
        }
        history
    }

    pub fn push(&mut self, round: RoundOutcome) {
        self.entries.push_back(round);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    #[must_use]
    pub fn last(&self) -> Option<&RoundOutcome> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &RoundOutcome> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Up to `n` most recent entries, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &RoundOutcome> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Outcome of the latest round and how many rounds in a row ended with it.
    #[must_use]
    pub fn streak(&self) -> Option<(Outcome, usize)> {
        let last = self.last()?.outcome;
        let len = self
            .entries
            .iter()
            .rev()
            .take_while(|round| round.outcome == last)
            .count();
        Some((last, len))
    }
}
