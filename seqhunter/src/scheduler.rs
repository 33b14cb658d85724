//! Block scheduler: nests reference blocks inside query blocks and
//! distributes seed-and-extend work over the pipeline crate's worker pool
//! (component L).
//!
//! Grounded in teacher's `binner.rs`, which drives `vendor::cue::pipeline`
//! over FASTA/FASTQ batches; `seqhunter-pipeline::pipeline` plays the same
//! role here, generalized from "one batch of reads" to "one (query block,
//! reference block) work unit".

use seqhunter_pipeline::{pipeline, Cancellation};

use crate::block::Block;
use crate::chainer::{cull_within_target, passes_filters, rank_targets, score_hits, sort_final, HitFilters, ScoredHit, TargetHits};
use crate::dictionary::Dictionary;
use crate::error::{FatalErrors, SeqHunterError, WarningLog};
use crate::gapped::{gapped_extend, HspValues};
use crate::scoring::ScoreMatrix;
use crate::seed_index::{FrequentSeedSet, SortedList};
use crate::seed_matcher::match_seeds;
use crate::shape::{Reduction, Shape};
use crate::stats::{length_adjustment, DEFAULT_LENGTH_ADJUSTMENT_ITERATIONS};
use crate::ungapped::{extend, primary_hit_filter};

/// Run-wide configuration the scheduler needs beyond what lives in
/// `Config` (kept separate so unit tests can build one without pulling in
/// the CLI parser).
pub struct SchedulerParams<'a> {
    pub matrix: &'a ScoreMatrix,
    pub shape: Shape,
    pub reduction: Reduction,
    pub x_drop: i32,
    pub band_width: i32,
    pub band_for_culling: i64,
    pub rank_ratio: f64,
    pub max_targets: Option<usize>,
    pub filters: HitFilters,
    pub db_sequence_count: u64,
    pub db_total_letters: u64,
}

/// Runs one query block against one reference block: builds seed indices
/// for both, matches, extends, chains, and returns every surviving hit per
/// query sequence index.
pub fn run_one_pair(
    query_block: &Block,
    ref_block: &Block,
    params: &SchedulerParams,
    dictionary: &Dictionary,
    warnings: &WarningLog,
) -> Vec<(usize, Vec<ScoredHit>)> {
    let query_list = SortedList::build_streaming(query_block, &params.shape, &params.reduction);
    let ref_list = SortedList::build(ref_block, &params.shape, &params.reduction);
    let frequent = FrequentSeedSet::from_lists(&[query_list.clone(), ref_list.clone()], 4096);

    let seed_hits = match_seeds(&query_list, &ref_list, &frequent);

    let mut extensions_by_target: std::collections::HashMap<(u32, u32), Vec<crate::ungapped::UngappedExtension>> = std::collections::HashMap::new();
    for seed_hit in &seed_hits {
        let query_seq = query_block.sequences.get(seed_hit.query_seq as usize);
        let ref_seq = ref_block.sequences.get(seed_hit.subject_seq as usize);
        let ext = extend(query_seq.residues(), ref_seq.residues(), seed_hit, params.shape.length as usize, params.matrix, params.x_drop);
        if ext.score <= 0 {
            continue;
        }
        extensions_by_target.entry((seed_hit.query_seq, seed_hit.subject_seq)).or_default().push(ext);
    }

    let mut per_query_target: std::collections::HashMap<(u32, u32), Vec<crate::gapped::Hsp>> = std::collections::HashMap::new();
    for ((query_seq, subject_seq), extensions) in extensions_by_target {
        let primary = primary_hit_filter(extensions, params.band_for_culling);
        let query_seq_view = query_block.sequences.get(query_seq as usize);
        let ref_seq_view = ref_block.sequences.get(subject_seq as usize);
        for ext in &primary {
            let hsp = gapped_extend(
                query_seq_view.residues(),
                ref_seq_view.residues(),
                ext,
                params.matrix,
                None,
                params.band_width,
                HspValues::SCORE | HspValues::TRANSCRIPT,
            );
            per_query_target.entry((query_seq, subject_seq)).or_default().push(hsp);
        }
    }

    let mut by_query: std::collections::HashMap<u32, Vec<TargetHits>> = std::collections::HashMap::new();
    for ((query_seq, subject_seq), hsps) in per_query_target {
        let culled = cull_within_target(hsps, 0.9);
        let oid = ref_block.oids.get(subject_seq as usize).copied().unwrap_or(subject_seq as u64);
        by_query.entry(query_seq).or_default().push(TargetHits { subject_oid: oid, hsps: culled });
    }

    let mut out = Vec::new();
    for (query_seq, targets) in by_query {
        let ranked = rank_targets(targets, params.rank_ratio, params.max_targets);
        let query_len = query_block.sequences.get(query_seq as usize).len();

        let ka = params.matrix.ungapped_ka;
        let eff = length_adjustment(query_len, params.db_total_letters, params.db_sequence_count, &ka, DEFAULT_LENGTH_ADJUSTMENT_ITERATIONS);
        let mut scored = score_hits(&ranked, &eff, &ka);

        scored.retain(|s| {
            let subject_len = s.hsp.subject_end - s.hsp.subject_begin;
            passes_filters(&s.hsp, query_len, subject_len, false, &params.filters)
        });
        sort_final(&mut scored);

        for s in &scored {
            dictionary.id_for(s.subject_oid);
        }
        if scored.is_empty() {
            warnings.push(format!("query {query_seq}: no hits survived filtering"));
        }
        out.push((query_seq as usize, scored));
    }
    out
}

/// Distributes a full pass — every reference block against one query
/// block — across the pipeline's worker pool, collecting and merging
/// per-query results. Each reference block is one unit of work; failures
/// are reported to `fatal_errors` and short-circuit remaining work via
/// `cancel`.
pub fn run_query_against_database(
    query_block: &Block,
    ref_blocks: &[Block],
    params: &SchedulerParams,
    threads: usize,
    dictionary: &Dictionary,
    warnings: &WarningLog,
    fatal_errors: &FatalErrors,
    cancel: &Cancellation,
) -> Vec<(usize, Vec<ScoredHit>)> {
    let results: Vec<Vec<(usize, Vec<ScoredHit>)>> = pipeline(threads.max(1), ref_blocks.iter().collect::<Vec<_>>(), |ref_block| {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run_one_pair(query_block, ref_block, params, dictionary, warnings)));
        match outcome {
            Ok(v) => v,
            Err(_) => {
                fatal_errors.report(SeqHunterError::SeqSrc("reference block worker panicked".into()));
                cancel.cancel();
                Vec::new()
            }
        }
    });

    let mut merged: std::collections::HashMap<usize, Vec<ScoredHit>> = std::collections::HashMap::new();
    for per_block in results {
        for (query_idx, hits) in per_block {
            merged.entry(query_idx).or_default().extend(hits);
        }
    }
    let mut out: Vec<(usize, Vec<ScoredHit>)> = merged.into_iter().collect();
    for (_, hits) in out.iter_mut() {
        sort_final(hits);
    }
    out.sort_by_key(|(idx, _)| *idx);
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scoring::CbsMode;

    fn params(matrix: &ScoreMatrix) -> SchedulerParams<'_> {
        SchedulerParams {
            matrix,
            shape: Shape::contiguous(4),
            reduction: Reduction::identity(),
            x_drop: 10,
            band_width: 16,
            band_for_culling: 2,
            rank_ratio: 0.6,
            max_targets: None,
            filters: HitFilters::default(),
            db_sequence_count: 1,
            db_total_letters: 1000,
        }
    }

    #[test]
    fn identical_query_and_reference_produce_a_hit() {
        let matrix = ScoreMatrix::blosum62(11, 1, CbsMode::Off);
        let query_block = Block::load_protein(vec![("ARNDCQEGHILKMFPSTWYV", "q".to_string())]);
        let ref_block = Block::load_protein(vec![("ARNDCQEGHILKMFPSTWYV", "r".to_string())]);
        let p = params(&matrix);
        let dictionary = Dictionary::new();
        let warnings = WarningLog::new();
        let results = run_one_pair(&query_block, &ref_block, &p, &dictionary, &warnings);
        assert!(!results.is_empty());
        let (_, hits) = &results[0];
        assert!(!hits.is_empty());
    }

    #[test]
    fn unrelated_sequences_produce_no_hits() {
        let matrix = ScoreMatrix::blosum62(11, 1, CbsMode::Off);
        let query_block = Block::load_protein(vec![("AAAAAAAAAAAAAAAAAAAA", "q".to_string())]);
        let ref_block = Block::load_protein(vec![("WWWWWWWWWWWWWWWWWWWW", "r".to_string())]);
        let p = params(&matrix);
        let dictionary = Dictionary::new();
        let warnings = WarningLog::new();
        let results = run_one_pair(&query_block, &ref_block, &p, &dictionary, &warnings);
        let total_hits: usize = results.iter().map(|(_, h)| h.len()).sum();
        assert_eq!(total_hits, 0);
    }
}
