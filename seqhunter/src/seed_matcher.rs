//! Tiled query x subject seed matching (component E).
//!
//! Teacher's `index.rs` walks a query against an FM-index one k-mer at a
//! time (`matching_tax_ids`); here the two sides are each pre-sorted seed
//! arrays, so the natural idiom is a sorted merge-walk. `itertools` is
//! already a teacher dependency (used in `collapse.rs`'s heap merging), so
//! `merge_join_by` is the direct generalization of that pattern to two
//! full arrays instead of a binary heap of iterators.

use itertools::{EitherOrBoth, Itertools};

use crate::seed_index::{unpack_position, FrequentSeedSet, SeedEntry, SortedList};

/// One seed collision between a query and a subject position, expressed
/// as the diagonal offset the ungapped extender needs (spec section 4.E /
/// 4.F).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedHit {
    pub query_seq: u32,
    pub query_pos: u32,
    pub subject_seq: u32,
    pub subject_pos: u32,
}

/// Outer tile size: how many query seed-list entries are merged against
/// the full subject list before moving to the next outer chunk. Keeps the
/// merge-walk's working set cache-resident (spec section 4.E).
pub const OUTER_TILE: usize = 1024;
/// Inner tile size, for the register-blocked match expansion within one
/// outer chunk.
pub const INNER_TILE: usize = 128;
/// Query sequences grouped per inner tile iteration (six-frame queries
/// naturally come in groups of six; this generalizes to "however many
/// queries fit the register block").
pub const QUERY_REGISTER_BLOCK: usize = 6;

/// Merges a query [`SortedList`] against a subject [`SortedList`] built
/// with the same [`crate::shape::Shape`]/[`crate::shape::Reduction`],
/// emitting one [`SeedHit`] per colliding (query position, subject
/// position) pair. Seeds present in `frequent` are skipped entirely: they
/// would flood the output with low-information matches (spec section
/// 4.D/4.E).
pub fn match_seeds(query: &SortedList, subject: &SortedList, frequent: &FrequentSeedSet) -> Vec<SeedHit> {
    let mut hits = Vec::new();
    for chunk in query.entries().chunks(OUTER_TILE) {
        match_chunk(chunk, subject, frequent, &mut hits);
    }
    hits
}

fn match_chunk(query_chunk: &[SeedEntry], subject: &SortedList, frequent: &FrequentSeedSet, hits: &mut Vec<SeedHit>) {
    for inner in query_chunk.chunks(INNER_TILE) {
        let merged = inner
            .iter()
            .copied()
            .merge_join_by(subject.entries().iter().copied(), |a, b| a.seed.cmp(&b.seed));

        // merge_join_by over two fully sorted lists yields runs of equal
        // seeds only when adjacent; group consecutive Both entries that
        // share a seed value to find every (query, subject) pair.
        let mut pending_query: Vec<SeedEntry> = Vec::new();
        let mut pending_subject: Vec<SeedEntry> = Vec::new();
        let mut current_seed: Option<u64> = None;

        for step in merged {
            let seed = match &step {
                EitherOrBoth::Both(q, _) => q.seed,
                EitherOrBoth::Left(q) => q.seed,
                EitherOrBoth::Right(s) => s.seed,
            };
            if current_seed != Some(seed) {
                flush_pending(&pending_query, &pending_subject, frequent, hits);
                pending_query.clear();
                pending_subject.clear();
                current_seed = Some(seed);
            }
            match step {
                EitherOrBoth::Both(q, s) => {
                    pending_query.push(q);
                    pending_subject.push(s);
                }
                EitherOrBoth::Left(q) => pending_query.push(q),
                EitherOrBoth::Right(s) => pending_subject.push(s),
            }
        }
        flush_pending(&pending_query, &pending_subject, frequent, hits);
    }
}

fn flush_pending(queries: &[SeedEntry], subjects: &[SeedEntry], frequent: &FrequentSeedSet, hits: &mut Vec<SeedHit>) {
    if queries.is_empty() || subjects.is_empty() {
        return;
    }
    let seed = queries[0].seed;
    if frequent.contains(seed) {
        return;
    }
    for q in queries.iter().take(QUERY_REGISTER_BLOCK.min(queries.len())) {
        let (q_seq, q_pos) = unpack_position(q.position);
        for s in subjects {
            let (s_seq, s_pos) = unpack_position(s.position);
            hits.push(SeedHit { query_seq: q_seq, query_pos: q_pos, subject_seq: s_seq, subject_pos: s_pos });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::Block;
    use crate::shape::{Reduction, Shape};

    #[test]
    fn identical_sequences_produce_diagonal_hits() {
        let block = Block::load_protein(vec![("ARNDCQEGHILK", "t".to_string())]);
        let shape = Shape::contiguous(4);
        let reduction = Reduction::identity();
        let list = SortedList::build(&block, &shape, &reduction);
        let frequent = FrequentSeedSet::default();
        let hits = match_seeds(&list, &list, &frequent);
        assert!(hits.iter().any(|h| h.query_pos == h.subject_pos));
    }

    #[test]
    fn disjoint_alphabets_produce_no_hits() {
        let q_block = Block::load_protein(vec![("AAAAAAAA", "q".to_string())]);
        let s_block = Block::load_protein(vec![("WWWWWWWW", "s".to_string())]);
        let shape = Shape::contiguous(4);
        let reduction = Reduction::identity();
        let q_list = SortedList::build(&q_block, &shape, &reduction);
        let s_list = SortedList::build(&s_block, &shape, &reduction);
        let frequent = FrequentSeedSet::default();
        let hits = match_seeds(&q_list, &s_list, &frequent);
        assert!(hits.is_empty());
    }

    #[test]
    fn frequent_seed_set_suppresses_hits() {
        let block = Block::load_protein(vec![("AAAAAAAAAAAA", "t".to_string())]);
        let shape = Shape::contiguous(4);
        let reduction = Reduction::identity();
        let list = SortedList::build(&block, &shape, &reduction);
        let frequent = FrequentSeedSet::from_lists(&[list.clone()], 0);
        let hits = match_seeds(&list, &list, &frequent);
        assert!(hits.is_empty());
    }
}
