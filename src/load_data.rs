//! Parses a dataset of `<FEN> <result> <score>` lines into training entries,
//! running the bundled evaluator on each position and compacting its
//! per-parameter activations into a sparse tuple list.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context};
use rayon::prelude::*;

use crate::board::{Board, Color};
use crate::params::{self, Scorepair};
use crate::trace::Evaluator;
use crate::Res;

/// One active parameter index for one training entry: the white and black
/// activation counts, coefficients narrow enough that a position can only
/// activate a handful of any given index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub index: usize,
    pub wcoeff: i8,
    pub bcoeff: i8,
}

/// A single loaded, evaluated training position.
#[derive(Debug, Clone)]
pub struct Entry {
    pub game_result: f64,
    pub game_score: f64,
    pub static_eval: f64,
    pub phase: i32,
    pub phase_factors: [f64; 2],
    pub scale_factor: f64,
    pub side_to_move: Color,
    pub eval: Scorepair,
    pub safety: [Scorepair; 2],
    pub tuples: Vec<Tuple>,
    /// Label blended from `game_result` and `sigmoid(K, game_score)`, filled
    /// in once `K` has been fit.
    pub target: f64,
}

/// Whole loaded dataset.
#[derive(Debug, Default)]
pub struct Dataset {
    pub entries: Vec<Entry>,
}

/// Splits the tail of a dataset line into `(fen, result, score)`. The FEN
/// itself may contain internal spaces, so the last two whitespace-separated
/// tokens are peeled off first.
fn split_tail(line: &str) -> Res<(&str, &str, &str)> {
    let line = line.trim();
    let score_start = line.rfind(char::is_whitespace).context("line is missing a score field")?;
    let (rest, score) = (line[..score_start].trim_end(), line[score_start + 1..].trim());

    let result_start = rest.rfind(char::is_whitespace).context("line is missing a result field")?;
    let (fen, result) = (rest[..result_start].trim_end(), rest[result_start + 1..].trim());

    if fen.is_empty() {
        bail!("line has no FEN before the result/score tail: '{line}'");
    }
    Ok((fen, result, score))
}

fn build_entry(fen: &str, result: &str, score: &str, evaluator: &dyn Evaluator) -> Res<Option<Entry>> {
    let game_result: f64 = result.parse().with_context(|| format!("bad result field '{result}'"))?;
    let game_score: f64 = score.parse().with_context(|| format!("bad score field '{score}'"))?;

    let board = Board::from_fen(fen).with_context(|| format!("bad FEN '{fen}'"))?;
    let (static_eval_stm, trace) = evaluator.evaluate(&board);

    if trace.scale_factor == 0 {
        return Ok(None);
    }

    let static_eval = if board.side_to_move == Color::Black {
        f64::from(-static_eval_stm)
    } else {
        f64::from(static_eval_stm)
    };

    let phase = trace.phase;
    let mg_factor = f64::from(phase) / 24.0;
    let phase_factors = [mg_factor, 1.0 - mg_factor];
    let scale_factor = f64::from(trace.scale_factor) / 256.0;

    let mut tuples = Vec::new();
    for (index, coeff) in trace.coeffs.iter().enumerate() {
        let wc = coeff[Color::White as usize];
        let bc = coeff[Color::Black as usize];
        let active = wc != bc || (params::is_safety_term(index) && (wc != 0 || bc != 0));
        if active {
            tuples.push(Tuple { index, wcoeff: wc, bcoeff: bc });
        }
    }
    tuples.sort_by_key(|t| t.index);

    Ok(Some(Entry {
        game_result,
        game_score,
        static_eval,
        phase,
        phase_factors,
        scale_factor,
        side_to_move: board.side_to_move,
        eval: trace.eval,
        safety: trace.safety,
        tuples,
        target: 0.0,
    }))
}

/// Loads a dataset file, dropping any position whose `scaleFactor` is zero.
/// Fails the whole load on the first malformed line — the dataset is
/// assumed curated ahead of time.
pub fn load_from_file(path: &Path, evaluator: &dyn Evaluator) -> Res<Dataset> {
    let file = File::open(path).with_context(|| format!("could not open dataset '{}'", path.display()))?;
    let reader = BufReader::new(file);

    let lines: Vec<String> = reader
        .lines()
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("I/O error reading dataset '{}'", path.display()))?;

    let parsed: Res<Vec<Option<Entry>>> = lines
        .par_iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(lineno, line)| {
            let (fen, result, score) = split_tail(line)
                .with_context(|| format!("dataset '{}' line {}", path.display(), lineno + 1))?;
            build_entry(fen, result, score, evaluator)
                .with_context(|| format!("dataset '{}' line {}", path.display(), lineno + 1))
        })
        .collect();

    let entries: Vec<Entry> = parsed?.into_iter().flatten().collect();
    println!("loaded {} position(s) from '{}'", entries.len(), path.display());

    Ok(Dataset { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::ReferenceEval;

    #[test]
    fn splits_a_tail_with_an_internal_fen_space() {
        let (fen, result, score) =
            split_tail("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1 0.5 12").unwrap();
        assert_eq!(fen, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        assert_eq!(result, "0.5");
        assert_eq!(score, "12");
    }

    #[test]
    fn rejects_a_line_with_fewer_than_three_tokens() {
        assert!(split_tail("just one token").is_ok());
        assert!(split_tail("onlyonetoken").is_err());
    }

    #[test]
    fn builds_an_entry_with_sorted_active_tuples() {
        let evaluator = ReferenceEval::new();
        let entry = build_entry(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR",
            "0.5",
            "0",
            &evaluator,
        );
        let entry = entry.unwrap().unwrap();
        let mut sorted = entry.tuples.clone();
        sorted.sort_by_key(|t| t.index);
        assert_eq!(entry.tuples, sorted);
        assert!(entry.tuples.iter().all(|t| t.wcoeff != t.bcoeff || params::is_safety_term(t.index)));
    }

    #[test]
    fn drops_entries_with_zero_scale_factor() {
        let evaluator = ReferenceEval::new();
        let entry = build_entry("4k3/8/8/8/8/8/8/4K3 w - - 0 1", "0.5", "0", &evaluator).unwrap();
        assert!(entry.is_none());
    }
}
