//! Dashboard sink for round summaries and predictions.

use std::io::Write;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::engine::{Mode, Outcome, Pick, Prediction, RoundSummary};
use crate::error::Result;

/// Receives everything the engine wants displayed.
pub trait Dashboard: Send + Sync {
    fn round(&self, summary: &RoundSummary) -> Result<()>;
    fn prediction(&self, prediction: &Prediction) -> Result<()>;
}

/// One dashboard message, tagged by `event`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Emission {
    Round {
        sequence_id: u64,
        sum: u8,
        outcome: Outcome,
        at: DateTime<Utc>,
    },
    Predict {
        pick: Pick,
        confidence: f64,
        mode: Mode,
        at: DateTime<Utc>,
    },
}

impl Emission {
    #[must_use]
    pub fn from_round(summary: &RoundSummary) -> Self {
        Self::Round {
            sequence_id: summary.sequence_id,
            sum: summary.sum,
            outcome: summary.outcome,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn from_prediction(prediction: &Prediction) -> Self {
        Self::Predict {
            pick: prediction.pick,
            confidence: prediction.confidence,
            mode: prediction.mode,
            at: Utc::now(),
        }
    }
}

/// Writes one JSON object per line to any writer (stdout by default).
pub struct JsonLinesDashboard {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesDashboard {
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn emit(&self, emission: &Emission) -> Result<()> {
        let line = serde_json::to_string(emission)?;
        let mut out = self.out.lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl Dashboard for JsonLinesDashboard {
    fn round(&self, summary: &RoundSummary) -> Result<()> {
        self.emit(&Emission::from_round(summary))
    }

    fn prediction(&self, prediction: &Prediction) -> Result<()> {
        self.emit(&Emission::from_prediction(prediction))
    }
}
