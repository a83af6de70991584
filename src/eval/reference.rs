//! A minimal evaluator exercising every parameter group this crate actually
//! activates: material, piece-square tables, castling, initiative and a
//! chebyshev-distance king-safety term. Everything else declared in
//! [`crate::params::GROUPS`] (mobility, threats, passed-pawn refinements, ...)
//! stays at zero here — there is no board representation in this crate rich
//! enough to compute them, and nothing downstream needs it to be.

use crate::board::{Board, Color, PieceType};
use crate::params::{self, Scorepair};
use crate::psq;
use crate::trace::{Evaluator, Trace};

/// Phase weight per piece, following the usual 24-point convention: two
/// knights and two bishops contribute 1 each, two rooks 2 each, one queen 4.
fn phase_weight(piece: PieceType) -> i32 {
    match piece {
        PieceType::Knight | PieceType::Bishop => 1,
        PieceType::Rook => 2,
        PieceType::Queen => 4,
        PieceType::Pawn | PieceType::King => 0,
    }
}

const TOTAL_PHASE: i32 = 24;

/// King-safety attacker weight index for a piece type, if it has one.
fn king_safety_index(piece: PieceType) -> Option<usize> {
    match piece {
        PieceType::Knight => Some(params::IDX_KS_KNIGHT),
        PieceType::Bishop => Some(params::IDX_KS_BISHOP),
        PieceType::Rook => Some(params::IDX_KS_ROOK),
        PieceType::Queen => Some(params::IDX_KS_QUEEN),
        PieceType::Pawn | PieceType::King => None,
    }
}

/// Clamped quadratic fold: `max(0, s) * s / 256`, truncating like the
/// original integer division.
fn fold_mg(s: i32) -> i32 {
    0.max(s) * s / 256
}

/// Clamped linear fold: `max(0, s) / 16`.
fn fold_eg(s: i32) -> i32 {
    0.max(s) / 16
}

/// A reference evaluator bundled so the tuner has something concrete to run
/// against: a fixed set of weights plus a board walk that fills in a
/// [`Trace`] the same way the real engine's evaluation would.
pub struct ReferenceEval {
    base: params::ScorepairVector,
}

impl ReferenceEval {
    pub fn new() -> Self {
        Self { base: params::base_values() }
    }
}

impl Default for ReferenceEval {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for ReferenceEval {
    fn evaluate(&self, board: &Board) -> (i32, Trace) {
        let mut trace = Trace::new();
        let mut phase = 0;
        let mut pawns_on_board = false;

        for (square, piece) in board.pieces() {
            let (piece_value_idx, psqt_idx) = psq::activation(piece.kind, piece.color, square);
            if let Some(idx) = piece_value_idx {
                trace.add(idx, piece.color, 1);
            }
            if let Some(idx) = psqt_idx {
                trace.add(idx, piece.color, 1);
            }
            phase += phase_weight(piece.kind);
            pawns_on_board |= piece.kind == PieceType::Pawn;
        }

        for color in [Color::White, Color::Black] {
            if let Some(king_sq) = board.king_square(color) {
                let back_rank = if color == Color::White { 0 } else { 7 };
                if king_sq.rank() == back_rank && (king_sq.file() == 6 || king_sq.file() == 2) {
                    trace.add(params::IDX_CASTLING, color, 1);
                }
            }
        }
        trace.add(params::IDX_INITIATIVE, board.side_to_move, 1);

        // King safety: each side's pieces within two squares of the enemy
        // king contribute to that side's attacking potential against it.
        for attacker_color in [Color::White, Color::Black] {
            let Some(defender_king) = board.king_square(attacker_color.opposite()) else {
                continue;
            };
            let mut attackers: i8 = 0;
            for (square, piece) in board.pieces() {
                if piece.color != attacker_color {
                    continue;
                }
                let Some(idx) = king_safety_index(piece.kind) else { continue };
                if square.chebyshev_distance(defender_king) <= 2 {
                    trace.add(idx, attacker_color, 1);
                    attackers += 1;
                }
            }
            if attackers > 0 {
                trace.add(params::IDX_KS_ATTACK, attacker_color, attackers);
            }
        }
        trace.add(params::IDX_KS_OFFSET, Color::White, 1);
        trace.add(params::IDX_KS_OFFSET, Color::Black, 1);

        let mut linear = Scorepair::ZERO;
        let mut safety = [Scorepair::ZERO; 2];
        for (index, coeff) in trace.coeffs.iter().enumerate() {
            if params::is_safety_term(index) {
                let base = self.base[index];
                safety[Color::White as usize] =
                    safety[Color::White as usize] + base * i32::from(coeff[Color::White as usize]);
                safety[Color::Black as usize] =
                    safety[Color::Black as usize] + base * i32::from(coeff[Color::Black as usize]);
            } else {
                let diff = i32::from(coeff[Color::White as usize]) - i32::from(coeff[Color::Black as usize]);
                linear = linear + self.base[index] * diff;
            }
        }
        trace.safety = safety;

        let phase = phase.min(TOTAL_PHASE);
        trace.phase = phase;
        trace.scale_factor = if pawns_on_board { 256 } else { 0 };

        let white = safety[Color::White as usize];
        let black = safety[Color::Black as usize];
        let fold = Scorepair::new(fold_mg(white.mg) - fold_mg(black.mg), fold_eg(white.eg) - fold_eg(black.eg));
        // `entry.eval`/`Trace.eval` carries the folded safety already, matching
        // the original's `entry->eval` semantics that `adjusted_eval` assumes:
        // it subtracts this same fold (computed from the raw, unfolded
        // `safety[WHITE]`/`safety[BLACK]`) before re-adding the recomputed one.
        let total = linear + fold;
        trace.eval = total;

        let mg_factor = f64::from(phase) / f64::from(TOTAL_PHASE);
        let eg_factor = (1.0 - mg_factor) * (f64::from(trace.scale_factor) / 256.0);
        let mixed = f64::from(total.mg) * mg_factor + f64::from(total.eg) * eg_factor;
        let white_relative = mixed.round() as i32;

        let score =
            if board.side_to_move == Color::Black { -white_relative } else { white_relative };

        (score, trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_is_symmetric_under_side_to_move() {
        // The layout is colour-symmetric, so whichever side is to move should
        // see the exact same side-relative score (the tempo/initiative bonus
        // tracks the mover, not a fixed colour).
        let eval = ReferenceEval::new();
        let white_to_move =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        let black_to_move =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1").unwrap();
        let (white_score, trace) = eval.evaluate(&white_to_move);
        let (black_score, _) = eval.evaluate(&black_to_move);
        assert_eq!(white_score, black_score);
        assert_eq!(trace.phase, TOTAL_PHASE);
        assert_eq!(trace.scale_factor, 256);
    }

    #[test]
    fn lone_king_position_has_no_pawns_and_zero_scale_factor() {
        let eval = ReferenceEval::new();
        let board = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let (_, trace) = eval.evaluate(&board);
        assert_eq!(trace.scale_factor, 0);
    }

    #[test]
    fn extra_white_queen_favors_white() {
        let eval = ReferenceEval::new();
        let board = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let (score, _) = eval.evaluate(&board);
        assert!(score > 0);
    }

    #[test]
    fn king_hunt_activates_safety_attackers() {
        let eval = ReferenceEval::new();
        let board = Board::from_fen("3k4/3Q4/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let (_, trace) = eval.evaluate(&board);
        assert_eq!(trace.coeffs[params::IDX_KS_QUEEN][Color::White as usize], 1);
        assert_eq!(trace.coeffs[params::IDX_KS_ATTACK][Color::White as usize], 1);
    }
}
