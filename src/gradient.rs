//! Analytic re-evaluation under a candidate `delta` (no re-running the
//! evaluator), and the per-index gradient of the sigmoid loss over a batch.

use rayon::prelude::*;

use crate::load_data::{Dataset, Entry};
use crate::loss::sigmoid;
use crate::params::{self, Phased, PhasedVector};

/// Clamped quadratic fold on integers, truncating toward zero like the
/// original fixed-point evaluator: `max(0, s) * s / 256`.
fn fold_mg_i32(s: i32) -> i32 {
    0.max(s) * s / 256
}

/// Clamped linear fold on integers: `max(0, s) / 16`.
fn fold_eg_i32(s: i32) -> i32 {
    0.max(s) / 16
}

fn fold_mg_f64(s: f64) -> f64 {
    0f64.max(s) * s / 256.0
}

fn fold_eg_f64(s: f64) -> f64 {
    0f64.max(s) / 16.0
}

/// Output of re-evaluating one entry under a candidate `delta`: the mixed
/// score fed to the sigmoid, plus the per-side safety values the gradient
/// needs (they are non-linear, so the gradient can't be derived from `eval`
/// alone).
pub struct Adjusted {
    pub eval: f64,
    /// `safety[side]`, both phases, after adding the entry's safety-regime
    /// tuple deltas to the original raw (pre-fold) safety scorepair.
    pub safety: [Phased; 2],
}

/// Reconstructs an entry's mixed evaluation from its sparse tuples and the
/// current `delta`, without touching the board or the evaluator again.
pub fn adjusted_eval(entry: &Entry, delta: &PhasedVector) -> Adjusted {
    let mut linear_delta = Phased::ZERO;
    let mut wsafety_delta = Phased::ZERO;
    let mut bsafety_delta = Phased::ZERO;

    for tuple in &entry.tuples {
        let d = delta[tuple.index];
        if params::is_safety_term(tuple.index) {
            wsafety_delta.mg += f64::from(tuple.wcoeff) * d.mg;
            wsafety_delta.eg += f64::from(tuple.wcoeff) * d.eg;
            bsafety_delta.mg += f64::from(tuple.bcoeff) * d.mg;
            bsafety_delta.eg += f64::from(tuple.bcoeff) * d.eg;
        } else {
            let diff = f64::from(tuple.wcoeff - tuple.bcoeff);
            linear_delta.mg += diff * d.mg;
            linear_delta.eg += diff * d.eg;
        }
    }

    let mut normal_mg = f64::from(entry.eval.mg) + linear_delta.mg;
    let mut normal_eg = f64::from(entry.eval.eg) + linear_delta.eg;

    let wsafety = Phased::new(
        f64::from(entry.safety[0].mg) + wsafety_delta.mg,
        f64::from(entry.safety[0].eg) + wsafety_delta.eg,
    );
    let bsafety = Phased::new(
        f64::from(entry.safety[1].mg) + bsafety_delta.mg,
        f64::from(entry.safety[1].eg) + bsafety_delta.eg,
    );

    normal_mg -= f64::from(fold_mg_i32(entry.safety[0].mg) - fold_mg_i32(entry.safety[1].mg));
    normal_eg -= f64::from(fold_eg_i32(entry.safety[0].eg) - fold_eg_i32(entry.safety[1].eg));

    let safety_mg = fold_mg_f64(wsafety.mg) - fold_mg_f64(bsafety.mg);
    let safety_eg = fold_eg_f64(wsafety.eg) - fold_eg_f64(bsafety.eg);

    let midgame = normal_mg + safety_mg;
    let endgame = normal_eg + safety_eg;

    let mixed = midgame * entry.phase_factors[0] + endgame * entry.phase_factors[1] * entry.scale_factor;

    Adjusted { eval: mixed, safety: [wsafety, bsafety] }
}

/// Per-index gradient contribution of one entry, added into `gradient`.
///
/// The endgame safety-regime term intentionally compares `safety[WHITE].mg`
/// against `safety[BLACK].eg` (white tested at midgame, black at endgame).
/// This mixed-phase comparison is inherited verbatim from the source this
/// crate is grounded on; it is asymmetric between colours and looks like a
/// transcription slip there, but per the design notes it is preserved rather
/// than silently corrected. See DESIGN.md.
fn accumulate_gradient(entry: &Entry, delta: &PhasedVector, k: f64, gradient: &mut PhasedVector) {
    let adjusted = adjusted_eval(entry, delta);
    let s = sigmoid(k, adjusted.eval);
    let x = (entry.game_result - s) * s * (1.0 - s);
    let mg_base = x * entry.phase_factors[0];
    let eg_base = x * entry.phase_factors[1];

    let first_safety = entry.tuples.partition_point(|t| !params::is_safety_term(t.index));

    for tuple in &entry.tuples[..first_safety] {
        let diff = f64::from(tuple.wcoeff - tuple.bcoeff);
        gradient[tuple.index].mg += mg_base * diff;
        gradient[tuple.index].eg += eg_base * diff * entry.scale_factor;
    }

    let wsafety = adjusted.safety[0];
    let bsafety = adjusted.safety[1];
    for tuple in &entry.tuples[first_safety..] {
        let wc = f64::from(tuple.wcoeff);
        let bc = f64::from(tuple.bcoeff);

        gradient[tuple.index].mg +=
            mg_base / 128.0 * (wsafety.mg.max(0.0) * wc - bsafety.mg.max(0.0) * bc);
        gradient[tuple.index].eg += eg_base / 16.0
            * entry.scale_factor
            * (f64::from(wsafety.mg > 0.0) * wc - f64::from(bsafety.eg > 0.0) * bc);
    }
}

/// Sums gradients over one batch of `batch_size` consecutive entries
/// starting at `batch_start`, via a rayon fold + reduce (thread-local
/// partials, merged without fine-grained locking).
pub fn compute_batch_gradient(
    dataset: &Dataset,
    batch_start: usize,
    batch_size: usize,
    delta: &PhasedVector,
    k: f64,
) -> PhasedVector {
    let entries = &dataset.entries[batch_start..batch_start + batch_size];
    entries
        .par_iter()
        .fold(
            || vec![Phased::ZERO; params::PARAM_COUNT],
            |mut grad, entry| {
                accumulate_gradient(entry, delta, k, &mut grad);
                grad
            },
        )
        .reduce(
            || vec![Phased::ZERO; params::PARAM_COUNT],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x += *y;
                }
                a
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Color;
    use crate::load_data::{Entry, Tuple};
    use crate::params::Scorepair;

    fn entry_with_tuple(index: usize, wcoeff: i8, bcoeff: i8, game_result: f64, static_eval: f64) -> Entry {
        Entry {
            game_result,
            game_score: static_eval,
            static_eval,
            phase: 24,
            phase_factors: [1.0, 0.0],
            scale_factor: 1.0,
            side_to_move: Color::White,
            eval: Scorepair::new(static_eval as i32, 0),
            safety: [Scorepair::ZERO; 2],
            tuples: vec![Tuple { index, wcoeff, bcoeff }],
            target: game_result,
        }
    }

    #[test]
    fn adjusted_eval_matches_static_eval_at_zero_delta() {
        let entry = entry_with_tuple(0, 1, 0, 1.0, -200.0);
        let delta = vec![Phased::ZERO; params::PARAM_COUNT];
        let adjusted = adjusted_eval(&entry, &delta);
        assert!((adjusted.eval - (-200.0)).abs() < 1e-9);
    }

    #[test]
    fn adjusted_eval_matches_static_eval_at_zero_delta_with_non_zero_safety() {
        // White has a raw (pre-fold) safety of (256, 16), chosen so the
        // integer and float fold agree exactly (256 and 16 both divide
        // evenly). `entry.eval` is the post-fold total the evaluator would
        // report (linear -200/-200 plus the fold of 256/1), mirroring what
        // `eval::reference::ReferenceEval` now stores in `trace.eval`.
        let mut entry = entry_with_tuple(params::IDX_KS_KNIGHT, 1, 0, 1.0, 56.0);
        entry.eval = Scorepair::new(56, -199);
        entry.safety[0] = Scorepair::new(256, 16);
        let delta = vec![Phased::ZERO; params::PARAM_COUNT];
        let adjusted = adjusted_eval(&entry, &delta);
        assert!((adjusted.eval - entry.static_eval).abs() < 1e-9);
    }

    #[test]
    fn gradient_sign_is_positive_for_a_losing_white_favoured_tuple() {
        // result=1 (white won), eval strongly negative, one active linear
        // tuple with wc - bc > 0: the optimiser should want to push it up.
        let entry = entry_with_tuple(0, 1, 0, 1.0, -200.0);
        let dataset = Dataset { entries: vec![entry] };
        let delta = vec![Phased::ZERO; params::PARAM_COUNT];
        let gradient = compute_batch_gradient(&dataset, 0, 1, &delta, 1.0 / 400.0);
        assert!(gradient[0].mg > 0.0);
    }

    #[test]
    fn safety_regime_gradient_is_zero_when_safety_is_non_positive() {
        let mut entry = entry_with_tuple(params::IDX_KS_KNIGHT, 1, 0, 1.0, 0.0);
        entry.safety[0] = Scorepair::new(-10, -10);
        let dataset = Dataset { entries: vec![entry] };
        let delta = vec![Phased::ZERO; params::PARAM_COUNT];
        let gradient = compute_batch_gradient(&dataset, 0, 1, &delta, 1.0 / 400.0);
        assert_eq!(gradient[params::IDX_KS_KNIGHT].mg, 0.0);
    }

    #[test]
    fn safety_regime_gradient_is_positive_when_safety_is_positive() {
        let mut entry = entry_with_tuple(params::IDX_KS_KNIGHT, 1, 0, 1.0, 0.0);
        entry.safety[0] = Scorepair::new(10, 10);
        let dataset = Dataset { entries: vec![entry] };
        let delta = vec![Phased::ZERO; params::PARAM_COUNT];
        let gradient = compute_batch_gradient(&dataset, 0, 1, &delta, 1.0 / 400.0);
        assert!(gradient[params::IDX_KS_KNIGHT].mg > 0.0);
    }
}
