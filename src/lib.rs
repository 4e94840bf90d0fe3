//! Commit history aggregation across many local git repositories.
//!
//! The pipeline runs [`git::Locator`] to find and deduplicate repositories,
//! then, per repository on a worker pool, [`history::HistoryExtractor`],
//! [`history::parse_commit`] and [`classify::Classifier`], and finally folds
//! everything into an [`aggregate::Aggregator`]. [`run::Coordinator`] wires
//! the stages together.

pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod history;
pub mod identity;
pub mod model;
pub mod output;
pub mod period;
pub mod run;

pub use error::{Failure, FailureKind, GtallyError, Result};
