//! dpe - Dice pattern-scoring engine.
//!
//! Round outcomes are decomposed into feature keys whose reliability is
//! learned online; predictions aggregate the keys for the upcoming round.

pub mod app;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod feed;
pub mod storage;
pub mod test_utils;

pub use error::{DpeError, Result};
