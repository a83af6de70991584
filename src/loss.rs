//! The sigmoid loss and the decimal-refinement search for its temperature `K`.

use rayon::prelude::*;

use crate::load_data::Dataset;

/// `σ(K, E) = 1 / (1 + exp(-E·K))`.
pub fn sigmoid(k: f64, e: f64) -> f64 {
    1.0 / (1.0 + (-e * k).exp())
}

/// Mean squared error between each entry's pre-blended `target` and
/// `σ(k, eval)`, where `eval` is supplied per-entry by `eval_of`.
fn mse_with<F>(dataset: &Dataset, k: f64, eval_of: F) -> Option<f64>
where
    F: Fn(&crate::load_data::Entry) -> f64 + Sync,
{
    if dataset.entries.is_empty() {
        return None;
    }
    let sum: f64 = dataset
        .entries
        .par_iter()
        .map(|entry| {
            let diff = entry.target - sigmoid(k, eval_of(entry));
            diff * diff
        })
        .sum();
    Some(sum / dataset.entries.len() as f64)
}

/// Mean squared error using each entry's `static_eval` directly — used while
/// fitting `K`, before any tuning has happened.
pub fn static_mse(dataset: &Dataset, k: f64) -> Option<f64> {
    mse_with(dataset, k, |e| e.static_eval)
}

/// Mean squared error against the same λ-blended label the optimiser trains
/// on: `result·(1-λ) + σ(K, gameScore)·λ`, evaluated at the trial `K`. Used
/// only during K-search itself (before `target` is stored on each entry).
fn k_search_mse(dataset: &Dataset, k: f64, lambda: f64) -> Option<f64> {
    if dataset.entries.is_empty() {
        return None;
    }
    let sum: f64 = dataset
        .entries
        .par_iter()
        .map(|entry| {
            let label = entry.game_result * (1.0 - lambda) + sigmoid(k, entry.game_score) * lambda;
            let diff = label - sigmoid(k, entry.static_eval);
            diff * diff
        })
        .sum();
    Some(sum / dataset.entries.len() as f64)
}

/// Ten-pass decimal refinement of `K` over `[0, 10]`: each pass samples the
/// current bracket in steps of `step`, keeps the best `K`, recenters the
/// bracket on it and divides `step` by ten.
pub fn compute_optimal_k(dataset: &Dataset, lambda: f64) -> Option<f64> {
    if dataset.entries.is_empty() {
        return None;
    }

    let mut best_k = 0.0_f64;
    let mut start = 0.0_f64;
    let mut end = 10.0_f64;
    let mut step = 1.0_f64;

    for _ in 0..10 {
        let mut best_mse = f64::MAX;
        let mut k = start;
        while k <= end {
            let mse = k_search_mse(dataset, k, lambda).expect("checked non-empty above");
            if mse < best_mse {
                best_mse = mse;
                best_k = k;
            }
            k += step;
        }
        start = best_k - step;
        end = best_k + step;
        step /= 10.0;
    }

    Some(best_k)
}

/// Fills in each entry's blended label: `target = result·(1-λ) + σ(K, score)·λ`.
pub fn blend_labels(dataset: &mut Dataset, k: f64, lambda: f64) {
    for entry in &mut dataset.entries {
        entry.target = entry.game_result * (1.0 - lambda) + sigmoid(k, entry.game_score) * lambda;
    }
}

/// Mean squared error using an externally supplied per-entry evaluation
/// (e.g. the analytic re-evaluation under a candidate `delta`).
pub fn mse(dataset: &Dataset, k: f64, evals: &[f64]) -> Option<f64> {
    if dataset.entries.is_empty() {
        return None;
    }
    let sum: f64 = dataset
        .entries
        .par_iter()
        .zip(evals.par_iter())
        .map(|(entry, &eval)| {
            let diff = entry.target - sigmoid(k, eval);
            diff * diff
        })
        .sum();
    Some(sum / dataset.entries.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_data::Entry;
    use crate::board::Color;
    use crate::params::Scorepair;

    fn fixture_entry(game_result: f64, static_eval: f64) -> Entry {
        Entry {
            game_result,
            game_score: static_eval,
            static_eval,
            phase: 24,
            phase_factors: [1.0, 0.0],
            scale_factor: 1.0,
            side_to_move: Color::White,
            eval: Scorepair::ZERO,
            safety: [Scorepair::ZERO; 2],
            tuples: Vec::new(),
            target: game_result,
        }
    }

    #[test]
    fn sigmoid_is_half_at_zero() {
        assert!((sigmoid(1.0, 0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_dataset_has_no_mse() {
        let dataset = Dataset::default();
        assert_eq!(static_mse(&dataset, 1.0), None);
        assert_eq!(compute_optimal_k(&dataset, 0.5), None);
    }

    #[test]
    fn perfectly_labelled_entry_has_zero_loss_at_its_own_k() {
        // result 0.5 at eval 0 matches sigmoid(k, 0) == 0.5 for any k.
        let dataset = Dataset { entries: vec![fixture_entry(0.5, 0.0)] };
        let mse = static_mse(&dataset, 3.0).unwrap();
        assert!(mse < 1e-12);
    }

    #[test]
    fn k_search_mse_blends_game_score_with_lambda() {
        // game_result and game_score disagree; lambda=0 should match a plain
        // game_result fit, lambda=1 a plain game_score fit, and they should
        // differ on this entry.
        let entry = fixture_entry(0.0, 300.0);
        let dataset = Dataset { entries: vec![entry] };
        let result_only = k_search_mse(&dataset, 1.0 / 400.0, 0.0).unwrap();
        let score_only = k_search_mse(&dataset, 1.0 / 400.0, 1.0).unwrap();
        assert!((result_only - score_only).abs() > 1e-6);
    }

    #[test]
    fn k_search_is_idempotent() {
        let dataset = Dataset {
            entries: vec![fixture_entry(1.0, -200.0), fixture_entry(0.0, 150.0), fixture_entry(0.5, 0.0)],
        };
        let first = compute_optimal_k(&dataset, 0.5).unwrap();
        let second = compute_optimal_k(&dataset, 0.5).unwrap();
        assert_eq!(first, second);
    }
}
