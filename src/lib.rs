//! A Texel-style evaluation tuner: loads a dataset of labelled positions,
//! fits a sigmoid temperature, then learns an additive correction to a base
//! parameter vector by Adam-style gradient descent over an analytic,
//! phase-mixed, king-safety-aware loss.

use std::path::Path;

pub mod board;
pub mod eval;
pub mod gradient;
pub mod load_data;
pub mod loss;
pub mod optimizer;
pub mod params;
pub mod psq;
pub mod report;
pub mod trace;

/// This crate's fallible-boundary result alias.
pub type Res<T> = anyhow::Result<T>;

/// Loads the dataset at `path` against the bundled reference evaluator and
/// runs a full tuning session with `config`.
pub fn run(path: &Path, config: &optimizer::Config) -> Res<()> {
    let evaluator = eval::ReferenceEval::new();
    let dataset = load_data::load_from_file(path, &evaluator)?;
    optimizer::run(dataset, config)
}
