//! Gapped extension, wrapping `seqhunter-dp` (component H).
//!
//! Grounded in teacher's `ssw` crate usage pattern: a thin Rust layer
//! prepares inputs, calls the C kernel, and turns the raw result into a
//! domain type (`Hsp` here, analogous to whatever alignment struct teacher
//! built around `ssw::align`).

use seqhunter_dp::{align_score, align_traceback, DpParams, EditOp};

use crate::scoring::ScoreMatrix;
use crate::ungapped::UngappedExtension;

bitflags::bitflags! {
    /// Which fields of an [`Hsp`] a caller actually needs; lets the
    /// chainer skip the (expensive) traceback kernel when only the score
    /// is wanted for ranking (spec section 4.H: "HspValues-bitset-driven
    /// dispatch").
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct HspValues: u8 {
        const SCORE      = 0b0000_0001;
        const TRANSCRIPT = 0b0000_0010;
        const IDENTITIES = 0b0000_0100;
        const GAPS       = 0b0000_1000;
    }
}

/// One gapped high-scoring segment pair.
#[derive(Clone, Debug)]
pub struct Hsp {
    pub query_begin: usize,
    pub query_end: usize,
    pub subject_begin: usize,
    pub subject_end: usize,
    pub score: i32,
    pub identities: u32,
    pub positives: u32,
    pub mismatches: u32,
    pub gap_openings: u32,
    pub gap_letters: u32,
    pub transcript: Option<Vec<EditOp>>,
}

/// Extends an ungapped seed around its anchor with the full banded DP
/// kernel, widening the window a fixed margin beyond the ungapped
/// extension's bounds so gap openings near the edges aren't truncated.
pub fn gapped_extend(
    query: &[u8],
    subject: &[u8],
    anchor: &UngappedExtension,
    matrix: &ScoreMatrix,
    comp_bias: Option<&[i32]>,
    band_width: i32,
    wanted: HspValues,
) -> Hsp {
    let margin = (band_width as usize).max(8);
    let q_begin = anchor.query_begin as usize;
    let q_end = (anchor.query_end as usize + margin).min(query.len());
    let s_begin = anchor.subject_begin as usize;
    let s_end = (anchor.subject_end as usize + margin).min(subject.len());

    let q_slice = &query[q_begin..q_end];
    let s_slice = &subject[s_begin..s_end];
    let params = DpParams::new(matrix.as_i8_slice(), 28, matrix.gap_open, matrix.gap_extend, band_width);
    let local_bias = comp_bias.map(|b| &b[q_begin..q_end]);

    if wanted.contains(HspValues::TRANSCRIPT) {
        let (tb, score) = align_traceback(q_slice, s_slice, &params, local_bias);
        let (identities, positives, mismatches, gap_openings, gap_letters) = tally(&tb.ops, q_slice, s_slice, matrix);
        Hsp {
            query_begin: q_begin + tb.query_begin,
            query_end: q_begin + tb.query_end,
            subject_begin: s_begin + tb.target_begin,
            subject_end: s_begin + tb.target_end,
            score,
            identities,
            positives,
            mismatches,
            gap_openings,
            gap_letters,
            transcript: Some(tb.ops),
        }
    } else {
        let result = align_score(q_slice, s_slice, &params, local_bias);
        Hsp {
            query_begin: q_begin,
            query_end: q_begin + result.query_end,
            subject_begin: s_begin,
            subject_end: s_begin + result.target_end,
            score: result.score,
            identities: 0,
            positives: 0,
            mismatches: 0,
            gap_openings: 0,
            gap_letters: 0,
            transcript: None,
        }
    }
}

fn tally(ops: &[EditOp], query: &[u8], subject: &[u8], matrix: &ScoreMatrix) -> (u32, u32, u32, u32, u32) {
    let mut identities = 0;
    let mut positives = 0;
    let mut mismatches = 0;
    let mut gap_openings = 0;
    let mut gap_letters = 0;
    let mut qi = 0usize;
    let mut si = 0usize;
    let mut in_gap = false;

    for op in ops {
        match op {
            EditOp::Match(_) => {
                identities += 1;
                positives += 1;
                qi += 1;
                si += 1;
                in_gap = false;
            }
            EditOp::Subst(_) => {
                if qi < query.len() && si < subject.len() && matrix.score(query[qi], subject[si]) > 0 {
                    positives += 1;
                } else {
                    mismatches += 1;
                }
                qi += 1;
                si += 1;
                in_gap = false;
            }
            EditOp::Insert(n) => {
                if !in_gap {
                    gap_openings += 1;
                }
                gap_letters += n;
                qi += *n as usize;
                in_gap = true;
            }
            EditOp::Delete(_, n) => {
                if !in_gap {
                    gap_openings += 1;
                }
                gap_letters += n;
                si += *n as usize;
                in_gap = true;
            }
        }
    }
    (identities, positives, mismatches, gap_openings, gap_letters)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scoring::CbsMode;

    #[test]
    fn identical_window_scores_positively_and_traces_back() {
        let matrix = ScoreMatrix::blosum62(11, 1, CbsMode::Off);
        let seq: Vec<u8> = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let anchor = UngappedExtension { query_begin: 0, query_end: 10, subject_begin: 0, subject_end: 10, score: 20, diagonal: 0 };
        let hsp = gapped_extend(&seq, &seq, &anchor, &matrix, None, 16, HspValues::SCORE | HspValues::TRANSCRIPT);
        assert!(hsp.score > 0);
        assert!(hsp.transcript.is_some());
        assert_eq!(hsp.mismatches, 0);
    }

    #[test]
    fn score_only_mode_skips_traceback() {
        let matrix = ScoreMatrix::blosum62(11, 1, CbsMode::Off);
        let seq: Vec<u8> = vec![0, 1, 2, 3, 4];
        let anchor = UngappedExtension { query_begin: 0, query_end: 5, subject_begin: 0, subject_end: 5, score: 10, diagonal: 0 };
        let hsp = gapped_extend(&seq, &seq, &anchor, &matrix, None, 16, HspValues::SCORE);
        assert!(hsp.transcript.is_none());
    }
}
