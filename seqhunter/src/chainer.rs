//! Per-query target ranking, culling, and final hit ordering (component
//! I).
//!
//! Grounded in `examples/original_source/src/align/query_mapper.cpp`'s
//! `Query_mapper` (raw-score cutoff, target ranking, `rank_ratio`) for the
//! ranking/culling shape, and in teacher's `collapse.rs` (`HeapItem`
//! ordering) for the final deterministic sort.

use crate::gapped::Hsp;
use crate::stats::{bit_score, e_value, EffectiveLengths};

/// Default fraction of the best target's score a later target must reach
/// to stay in the ranked set, matching `Config::rank_ratio`'s documented
/// default in the original source (`SPEC_FULL.md` section 10).
pub const DEFAULT_RANK_RATIO: f64 = 0.6;

/// All HSPs found for one (query, subject target) pair, plus the subject
/// object id for later lookup in the block's title/oid tables.
#[derive(Clone, Debug)]
pub struct TargetHits {
    pub subject_oid: u64,
    pub hsps: Vec<Hsp>,
}

/// User-facing acceptance filters applied after gapped extension (spec
/// section 4.I).
#[derive(Clone, Copy, Debug, Default)]
pub struct HitFilters {
    pub min_identity: Option<f64>,  // 0.0..=1.0
    pub min_query_cover: Option<f64>,
    pub min_subject_cover: Option<f64>,
    pub no_self_hits: bool,
}

/// Ranks targets by raw score (the Open Question resolution recorded in
/// `SPEC_FULL.md` section 11, item 3: `--top` is evaluated on raw score,
/// not bit score, to match the original's actual behavior), keeping only
/// targets whose best HSP reaches `rank_ratio` of the top target's best
/// score, then truncating to `max_targets` if given.
pub fn rank_targets(mut targets: Vec<TargetHits>, rank_ratio: f64, max_targets: Option<usize>) -> Vec<TargetHits> {
    targets.retain(|t| !t.hsps.is_empty());
    targets.sort_by(|a, b| best_score(b).cmp(&best_score(a)));
    let Some(top_score) = targets.first().map(best_score) else {
        return targets;
    };
    let cutoff = (top_score as f64 * rank_ratio) as i32;
    targets.retain(|t| best_score(t) >= cutoff);
    if let Some(max) = max_targets {
        targets.truncate(max);
    }
    targets
}

fn best_score(t: &TargetHits) -> i32 {
    t.hsps.iter().map(|h| h.score).max().unwrap_or(i32::MIN)
}

/// Drops HSPs within a target that are wholly contained (on the query
/// axis) within a higher-scoring HSP of the same target, keeping only
/// the hits that actually add coverage (spec section 4.I:
/// "inner_culling_overlap").
pub fn cull_within_target(mut hsps: Vec<Hsp>, max_overlap_fraction: f64) -> Vec<Hsp> {
    hsps.sort_by(|a, b| b.score.cmp(&a.score));
    let mut kept: Vec<Hsp> = Vec::new();
    'outer: for hsp in hsps {
        let len = (hsp.query_end - hsp.query_begin).max(1);
        for k in &kept {
            let overlap = overlap_len(hsp.query_begin, hsp.query_end, k.query_begin, k.query_end);
            if overlap as f64 / len as f64 > max_overlap_fraction {
                continue 'outer;
            }
        }
        kept.push(hsp);
    }
    kept
}

fn overlap_len(a_begin: usize, a_end: usize, b_begin: usize, b_end: usize) -> usize {
    let lo = a_begin.max(b_begin);
    let hi = a_end.min(b_end);
    hi.saturating_sub(lo)
}

/// Applies user filters to one HSP, given the query and subject lengths
/// needed for coverage fractions.
pub fn passes_filters(hsp: &Hsp, query_len: usize, subject_len: usize, same_sequence: bool, filters: &HitFilters) -> bool {
    if filters.no_self_hits && same_sequence {
        return false;
    }
    if let Some(min_id) = filters.min_identity {
        let aligned = (hsp.query_end - hsp.query_begin).max(1);
        let identity = hsp.identities as f64 / aligned as f64;
        if identity < min_id {
            return false;
        }
    }
    if let Some(min_qc) = filters.min_query_cover {
        let cover = (hsp.query_end - hsp.query_begin) as f64 / query_len.max(1) as f64;
        if cover < min_qc {
            return false;
        }
    }
    if let Some(min_sc) = filters.min_subject_cover {
        let cover = (hsp.subject_end - hsp.subject_begin) as f64 / subject_len.max(1) as f64;
        if cover < min_sc {
            return false;
        }
    }
    true
}

/// A fully scored hit, ready for output: the pieces an `Hsp` doesn't
/// carry by itself (statistics, subject identity).
#[derive(Clone, Debug)]
pub struct ScoredHit {
    pub subject_oid: u64,
    pub hsp: Hsp,
    pub bit_score: f64,
    pub e_value: f64,
}

pub fn score_hits(targets: &[TargetHits], eff: &EffectiveLengths, ungapped_ka: &crate::scoring::KarlinAltschul) -> Vec<ScoredHit> {
    let mut out = Vec::new();
    for t in targets {
        for hsp in &t.hsps {
            out.push(ScoredHit {
                subject_oid: t.subject_oid,
                bit_score: bit_score(hsp.score, ungapped_ka),
                e_value: e_value(hsp.score, ungapped_ka, eff),
                hsp: hsp.clone(),
            });
        }
    }
    out
}

/// Deterministic final ordering: ascending E-value, then descending raw
/// score, then ascending subject oid — ties must resolve the same way on
/// every run regardless of which worker thread produced which hit (spec
/// section 4.I, "deterministic sort").
pub fn sort_final(hits: &mut [ScoredHit]) {
    hits.sort_by(|a, b| {
        a.e_value
            .partial_cmp(&b.e_value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.hsp.score.cmp(&a.hsp.score))
            .then_with(|| a.subject_oid.cmp(&b.subject_oid))
    });
}

#[cfg(test)]
mod test {
    use super::*;

    fn hsp(score: i32, qb: usize, qe: usize) -> Hsp {
        Hsp {
            query_begin: qb,
            query_end: qe,
            subject_begin: 0,
            subject_end: qe - qb,
            score,
            identities: (qe - qb) as u32,
            positives: (qe - qb) as u32,
            mismatches: 0,
            gap_openings: 0,
            gap_letters: 0,
            transcript: None,
        }
    }

    #[test]
    fn rank_targets_drops_low_scoring_targets() {
        let targets = vec![
            TargetHits { subject_oid: 1, hsps: vec![hsp(100, 0, 50)] },
            TargetHits { subject_oid: 2, hsps: vec![hsp(10, 0, 50)] },
        ];
        let ranked = rank_targets(targets, DEFAULT_RANK_RATIO, None);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].subject_oid, 1);
    }

    #[test]
    fn rank_targets_respects_max_targets() {
        let targets = vec![
            TargetHits { subject_oid: 1, hsps: vec![hsp(100, 0, 50)] },
            TargetHits { subject_oid: 2, hsps: vec![hsp(99, 0, 50)] },
            TargetHits { subject_oid: 3, hsps: vec![hsp(98, 0, 50)] },
        ];
        let ranked = rank_targets(targets, 0.0, Some(2));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn cull_within_target_drops_fully_contained_hsp() {
        let hsps = vec![hsp(100, 0, 100), hsp(20, 10, 30)];
        let culled = cull_within_target(hsps, 0.5);
        assert_eq!(culled.len(), 1);
        assert_eq!(culled[0].score, 100);
    }

    #[test]
    fn sort_final_orders_by_e_value_then_score_then_oid() {
        let mut hits = vec![
            ScoredHit { subject_oid: 2, hsp: hsp(10, 0, 10), bit_score: 1.0, e_value: 0.01 },
            ScoredHit { subject_oid: 1, hsp: hsp(20, 0, 10), bit_score: 2.0, e_value: 0.001 },
        ];
        sort_final(&mut hits);
        assert_eq!(hits[0].subject_oid, 1);
    }
}
