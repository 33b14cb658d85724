//! Length adjustment, E-values, and bit scores (component J).
//!
//! Grounded in DIAMOND's `blast_query_info.c` / `blast_stat.c` length
//! adjustment iteration, reproduced here as a bounded fixed-point loop
//! rather than the original's Newton step, per the Open Question
//! resolution recorded in `DESIGN.md`.

use crate::scoring::KarlinAltschul;

/// Default cap on length-adjustment iterations (Open Question resolution
/// #3 in `SPEC_FULL.md` section 11): the fixed-point search converges in
/// 2-3 steps in practice, 20 is generous headroom.
pub const DEFAULT_LENGTH_ADJUSTMENT_ITERATIONS: u32 = 20;

/// Effective search space lengths after Karlin-Altschul edge-effect
/// correction.
#[derive(Clone, Copy, Debug)]
pub struct EffectiveLengths {
    pub query: f64,
    pub db: f64,
    pub length_adjustment: i64,
}

/// Iteratively solves for the length adjustment `l` such that
///
///   l = (ln(K * (m - l) * (n - N*l)) ) / H
///
/// for effective query length `m - l` and effective database length `n -
/// N*l`, where `n_seqs` is the number of sequences in the database
/// (`N`). Bounded to `0 <= l <= min(m, n)`, matching the original's
/// well-defined range.
pub fn length_adjustment(
    query_len: usize,
    db_len: u64,
    n_seqs: u64,
    ka: &KarlinAltschul,
    max_iterations: u32,
) -> EffectiveLengths {
    let m = query_len as f64;
    let n = db_len as f64;
    let alpha_beta = ka.h > 0.0;
    if !alpha_beta || m < 1.0 || n < 1.0 {
        return EffectiveLengths { query: m.max(1.0), db: n.max(1.0), length_adjustment: 0 };
    }

    let max_len = m.min(n);
    let mut l = 0.0f64;
    for _ in 0..max_iterations {
        let eff_m = (m - l).max(1.0);
        let eff_n = (n - (n_seqs as f64) * l).max(1.0);
        let arg = ka.k * eff_m * eff_n;
        if arg <= 0.0 {
            break;
        }
        let next_l = arg.ln() / ka.h;
        if !next_l.is_finite() {
            break;
        }
        let next_l = next_l.clamp(0.0, max_len);
        if (next_l - l).abs() < 1e-6 {
            l = next_l;
            break;
        }
        l = next_l;
    }
    let l = l.clamp(0.0, max_len);
    EffectiveLengths {
        query: (m - l).max(1.0),
        db: (n - (n_seqs as f64) * l).max(1.0),
        length_adjustment: l.round() as i64,
    }
}

/// Bit score: `(lambda * raw_score - ln(K)) / ln(2)`.
pub fn bit_score(raw_score: i32, ka: &KarlinAltschul) -> f64 {
    (ka.lambda * raw_score as f64 - ka.k.ln()) / std::f64::consts::LN_2
}

/// E-value from effective search space: `K * m' * n' * exp(-lambda * score)`.
pub fn e_value(raw_score: i32, ka: &KarlinAltschul, eff: &EffectiveLengths) -> f64 {
    ka.k * eff.query * eff.db * (-ka.lambda * raw_score as f64).exp()
}

/// Applies a composition-based statistics correction to a raw score before
/// converting to bit score / E-value, per the Open Question resolution
/// that CBS is applied before `--min-score` filtering (`SPEC_FULL.md`
/// section 11, item 2).
pub fn cbs_adjusted_score(raw_score: i32, correction: f64) -> i32 {
    (raw_score as f64 + correction).round() as i32
}

#[cfg(test)]
mod test {
    use super::*;

    fn ka() -> KarlinAltschul {
        KarlinAltschul { lambda: 0.267, k: 0.041, h: 0.14 }
    }

    #[test]
    fn length_adjustment_stays_in_bounds() {
        let eff = length_adjustment(300, 1_000_000, 500, &ka(), DEFAULT_LENGTH_ADJUSTMENT_ITERATIONS);
        assert!(eff.length_adjustment >= 0);
        assert!((eff.length_adjustment as f64) <= 300.0);
        assert!(eff.query > 0.0 && eff.query <= 300.0);
    }

    #[test]
    fn higher_score_gives_smaller_e_value() {
        let eff = length_adjustment(300, 1_000_000, 500, &ka(), DEFAULT_LENGTH_ADJUSTMENT_ITERATIONS);
        let low = e_value(40, &ka(), &eff);
        let high = e_value(100, &ka(), &eff);
        assert!(high < low);
    }

    #[test]
    fn bit_score_is_monotonic_in_raw_score() {
        assert!(bit_score(100, &ka()) > bit_score(50, &ka()));
    }

    #[test]
    fn degenerate_zero_length_query_does_not_panic() {
        let eff = length_adjustment(0, 1_000_000, 500, &ka(), DEFAULT_LENGTH_ADJUSTMENT_ITERATIONS);
        assert!(eff.query >= 1.0);
    }
}
