//! The contract every evaluator must expose to be tunable: a per-position trace
//! of phase, linear/safety scorepairs, and per-parameter activation counts.

use crate::board::{Board, Color};
use crate::params::{Scorepair, PARAM_COUNT};

/// Per-parameter activation counts for one position, one entry per side.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Endgame scaling multiplier in `[0, 256]`.
    pub scale_factor: i32,
    /// Material/positional phase, interpolated between an all-endgame and an
    /// all-midgame position.
    pub phase: i32,
    /// Total evaluation (material, psqt, castling, initiative, ...) *with*
    /// the king-safety fold already folded in, from `safety[WHITE]`/
    /// `safety[BLACK]` below. The gradient engine's analytic re-evaluation
    /// assumes this already carries the fold, so it can subtract the
    /// original fold and add back the recomputed one.
    pub eval: Scorepair,
    /// Raw per-side king-safety scorepair, before the quadratic/clamped fold.
    /// Indexed by [`Color`] as `usize`.
    pub safety: [Scorepair; 2],
    /// `coeffs[index][side]`: how many times parameter `index` was activated
    /// for `side` in this position.
    pub coeffs: Vec<[i8; 2]>,
}

impl Trace {
    pub fn new() -> Self {
        Trace {
            scale_factor: 256,
            phase: 0,
            eval: Scorepair::ZERO,
            safety: [Scorepair::ZERO; 2],
            coeffs: vec![[0, 0]; PARAM_COUNT],
        }
    }

    pub fn add(&mut self, index: usize, color: Color, count: i8) {
        self.coeffs[index][color as usize] =
            self.coeffs[index][color as usize].saturating_add(count);
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

/// An evaluator that can be tuned: running it on a position yields both the
/// side-to-move-relative score and the [`Trace`] behind it.
pub trait Evaluator: Sync {
    fn evaluate(&self, board: &Board) -> (i32, Trace);
}
