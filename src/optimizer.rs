//! Adam-style optimiser loop: batches the dataset, accumulates gradients via
//! [`crate::gradient::compute_batch_gradient`], and updates `delta` in place.

use anyhow::Context;

use crate::gradient::adjusted_eval;
use crate::load_data::Dataset;
use crate::loss::{blend_labels, compute_optimal_k, mse};
use crate::params::{self, Phased, PhasedVector};
use crate::report;
use crate::Res;

/// Compile-time defaults for every run; all overridable from the CLI. None
/// of these constants were retrievable from the filtered original source
/// (they live in an unretrieved `tuner.h`), so these are concrete choices
/// consistent with how the source uses them — see DESIGN.md.
pub struct Config {
    pub iters: usize,
    pub batch_size: usize,
    pub threads: usize,
    pub learning_rate: f64,
    pub lr_drop_iters: usize,
    pub lr_drop_value: f64,
    pub lambda: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            iters: 2000,
            batch_size: 16384,
            threads: 4,
            learning_rate: 1.0,
            lr_drop_iters: 400,
            lr_drop_value: 2.0,
            lambda: 0.5,
        }
    }
}

/// Adam moment state, one entry per parameter index.
struct AdamState {
    momentum: PhasedVector,
    velocity: PhasedVector,
}

impl AdamState {
    fn new() -> Self {
        AdamState {
            momentum: vec![Phased::ZERO; params::PARAM_COUNT],
            velocity: vec![Phased::ZERO; params::PARAM_COUNT],
        }
    }

    /// Applies one Adam step in place, mirroring the per-index update used
    /// throughout this training loop: no bias correction, matching the
    /// grounding source's plain exponential moving averages.
    fn step(&mut self, delta: &mut PhasedVector, gradient: &PhasedVector, lr: f64) {
        for i in 0..params::PARAM_COUNT {
            let g = gradient[i];
            self.momentum[i].mg = 0.9 * self.momentum[i].mg + 0.1 * g.mg;
            self.momentum[i].eg = 0.9 * self.momentum[i].eg + 0.1 * g.eg;
            self.velocity[i].mg = 0.999 * self.velocity[i].mg + 0.001 * g.mg * g.mg;
            self.velocity[i].eg = 0.999 * self.velocity[i].eg + 0.001 * g.eg * g.eg;
            delta[i].mg += self.momentum[i].mg * lr / (1e-8 + self.velocity[i].mg).sqrt();
            delta[i].eg += self.momentum[i].eg * lr / (1e-8 + self.velocity[i].eg).sqrt();
        }
    }
}

/// Evaluates the whole dataset under the current `delta` for loss reporting.
fn full_dataset_eval(dataset: &Dataset, delta: &PhasedVector) -> Vec<f64> {
    dataset.entries.iter().map(|entry| adjusted_eval(entry, delta).eval).collect()
}

/// Runs the full tuning session: fits `K`, blends labels, then iterates
/// Adam-style batches, printing loss and dumping parameters at checkpoints.
///
/// The whole loop runs inside a rayon pool pinned to `config.threads`
/// workers, matching the fixed-`THREADS`, static-chunk scheduling model this
/// crate is grounded on: the pool only ever does intra-batch work, never
/// spans iterations.
pub fn run(dataset: Dataset, config: &Config) -> Res<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("failed to start the worker thread pool")?;
    pool.install(|| run_on_pool(dataset, config))
}

fn run_on_pool(mut dataset: Dataset, config: &Config) -> Res<()> {
    let base = params::base_values();
    let k = compute_optimal_k(&dataset, config.lambda)
        .ok_or_else(|| anyhow::anyhow!("cannot fit K on an empty dataset"))?;
    println!("fit K = {k:.6}");
    blend_labels(&mut dataset, k, config.lambda);

    let batches_per_iter = dataset.entries.len() / config.batch_size;
    if batches_per_iter == 0 {
        anyhow::bail!(
            "dataset has {} entries, smaller than the batch size {}",
            dataset.entries.len(),
            config.batch_size
        );
    }

    let mut delta = vec![Phased::ZERO; params::PARAM_COUNT];
    let mut adam = AdamState::new();
    let mut lr = config.learning_rate;

    for iter in 0..config.iters {
        for batch in 0..batches_per_iter {
            let gradient = crate::gradient::compute_batch_gradient(
                &dataset,
                batch * config.batch_size,
                config.batch_size,
                &delta,
                k,
            );
            let scale = k * 2.0 / config.batch_size as f64;
            let scaled: PhasedVector = gradient.iter().map(|g| *g * scale).collect();
            adam.step(&mut delta, &scaled, lr);
        }

        let evals = full_dataset_eval(&dataset, &delta);
        let loss = mse(&dataset, k, &evals).unwrap_or(f64::NAN);
        println!("iteration {iter}, loss {loss:.8}");

        if iter % config.lr_drop_iters == config.lr_drop_iters - 1 {
            lr /= config.lr_drop_value;
        }
        if iter % 50 == 49 || iter + 1 == config.iters {
            report::dump(&base, &delta);
        }
    }

    Ok(())
}
