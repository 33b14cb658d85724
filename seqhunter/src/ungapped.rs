//! X-drop ungapped extension and primary-hit filtering (component F).
//!
//! Ungrounded in teacher directly; follows the free-function, data-in/
//! data-out idiom established across `shape.rs`/`masking.rs`. The
//! collision bitmask filter is grounded in
//! `examples/original_source/src/search/collision.h`: a hit is demoted to
//! "secondary" if a higher-scoring hit already covers the same diagonal
//! band around it, so only one hit per local region survives to gapped
//! extension.

use crate::alphabet::Letter;
use crate::scoring::ScoreMatrix;
use crate::seed_matcher::SeedHit;

/// An ungapped high-scoring segment pair: a diagonal run extended in both
/// directions from a seed hit until the running score drops more than
/// `x_drop` below its maximum (spec section 4.F).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UngappedExtension {
    pub query_begin: u32,
    pub query_end: u32,
    pub subject_begin: u32,
    pub subject_end: u32,
    pub score: i32,
    pub diagonal: i64, // subject_pos - query_pos, identifies the band
}

/// Extends a single seed hit left and right along its diagonal, tracking
/// the running score and the best-scoring prefix/suffix seen so far;
/// stops extending a direction once the score has fallen `x_drop` below
/// its running maximum (the defining behavior of X-drop extension).
pub fn extend(
    query: &[Letter],
    subject: &[Letter],
    hit: &SeedHit,
    seed_len: usize,
    matrix: &ScoreMatrix,
    x_drop: i32,
) -> UngappedExtension {
    let (left_q, left_s, left_score) = extend_left(query, subject, hit.query_pos as usize, hit.subject_pos as usize, matrix, x_drop);
    let seed_score = seed_score(query, subject, hit, seed_len, matrix);
    let (right_q, right_s, right_score) = extend_right(
        query,
        subject,
        hit.query_pos as usize + seed_len,
        hit.subject_pos as usize + seed_len,
        matrix,
        x_drop,
    );

    UngappedExtension {
        query_begin: (hit.query_pos as usize - left_q) as u32,
        query_end: (hit.query_pos as usize + seed_len + right_q) as u32,
        subject_begin: (hit.subject_pos as usize - left_s) as u32,
        subject_end: (hit.subject_pos as usize + seed_len + right_s) as u32,
        score: left_score + seed_score + right_score,
        diagonal: hit.subject_pos as i64 - hit.query_pos as i64,
    }
}

fn seed_score(query: &[Letter], subject: &[Letter], hit: &SeedHit, seed_len: usize, matrix: &ScoreMatrix) -> i32 {
    (0..seed_len)
        .map(|i| matrix.score(query[hit.query_pos as usize + i], subject[hit.subject_pos as usize + i]))
        .sum()
}

/// Returns (letters consumed in query, letters consumed in subject, best
/// score achieved), walking backward from `(q_start, s_start)` exclusive.
fn extend_left(
    query: &[Letter],
    subject: &[Letter],
    q_start: usize,
    s_start: usize,
    matrix: &ScoreMatrix,
    x_drop: i32,
) -> (usize, usize, i32) {
    let mut score = 0i32;
    let mut best_score = 0i32;
    let mut best_len = 0usize;
    let mut len = 0usize;
    while len < q_start && len < s_start {
        let qi = q_start - 1 - len;
        let si = s_start - 1 - len;
        score += matrix.score(query[qi], subject[si]);
        len += 1;
        if score > best_score {
            best_score = score;
            best_len = len;
        }
        if best_score - score > x_drop {
            break;
        }
    }
    (best_len, best_len, best_score)
}

fn extend_right(
    query: &[Letter],
    subject: &[Letter],
    q_start: usize,
    s_start: usize,
    matrix: &ScoreMatrix,
    x_drop: i32,
) -> (usize, usize, i32) {
    let mut score = 0i32;
    let mut best_score = 0i32;
    let mut best_len = 0usize;
    let mut len = 0usize;
    while q_start + len < query.len() && s_start + len < subject.len() {
        score += matrix.score(query[q_start + len], subject[s_start + len]);
        len += 1;
        if score > best_score {
            best_score = score;
            best_len = len;
        }
        if best_score - score > x_drop {
            break;
        }
    }
    (best_len, best_len, best_score)
}

/// Demotes lower-scoring extensions that overlap a higher-scoring one on
/// the same diagonal band, leaving only primary hits (grounded in
/// `collision.h`'s bitmask re-scan). `band` is the diagonal distance
/// within which two extensions are considered the same local region.
pub fn primary_hit_filter(mut extensions: Vec<UngappedExtension>, band: i64) -> Vec<UngappedExtension> {
    extensions.sort_by(|a, b| b.score.cmp(&a.score));
    let mut kept: Vec<UngappedExtension> = Vec::new();
    'outer: for ext in extensions {
        for k in &kept {
            if (ext.diagonal - k.diagonal).abs() <= band && ranges_overlap(ext.query_begin, ext.query_end, k.query_begin, k.query_end) {
                continue 'outer;
            }
        }
        kept.push(ext);
    }
    kept
}

fn ranges_overlap(a_begin: u32, a_end: u32, b_begin: u32, b_end: u32) -> bool {
    a_begin < b_end && b_begin < a_end
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scoring::CbsMode;

    fn matrix() -> ScoreMatrix {
        ScoreMatrix::blosum62(11, 1, CbsMode::Off)
    }

    #[test]
    fn identical_sequences_extend_to_full_length() {
        let seq: Vec<Letter> = vec![0, 1, 2, 3, 4, 5, 6, 7];
        let hit = SeedHit { query_seq: 0, query_pos: 2, subject_seq: 0, subject_pos: 2 };
        let ext = extend(&seq, &seq, &hit, 3, &matrix(), 10);
        assert_eq!(ext.query_begin, 0);
        assert_eq!(ext.query_end, 8);
        assert!(ext.score > 0);
    }

    #[test]
    fn primary_hit_filter_keeps_highest_scoring_overlap() {
        let a = UngappedExtension { query_begin: 0, query_end: 10, subject_begin: 0, subject_end: 10, score: 50, diagonal: 0 };
        let b = UngappedExtension { query_begin: 2, query_end: 12, subject_begin: 2, subject_end: 12, score: 20, diagonal: 0 };
        let kept = primary_hit_filter(vec![a, b], 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 50);
    }

    #[test]
    fn primary_hit_filter_keeps_non_overlapping_hits() {
        let a = UngappedExtension { query_begin: 0, query_end: 10, subject_begin: 0, subject_end: 10, score: 50, diagonal: 0 };
        let b = UngappedExtension { query_begin: 100, query_end: 110, subject_begin: 100, subject_end: 110, score: 20, diagonal: 0 };
        let kept = primary_hit_filter(vec![a, b], 2);
        assert_eq!(kept.len(), 2);
    }
}
