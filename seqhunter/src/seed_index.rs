//! Sorted seed arrays and partition histograms (component D).
//!
//! Teacher's `index.rs` builds an FM-index over the whole reference; this
//! spec instead wants a sorted-array index per shape/partition, the design
//! DIAMOND itself uses (see `SPEC_FULL.md` section 0's note on dropping
//! the `bio` FM-index path). The *shape* of the code — build once from a
//! block, then query read-only from many worker threads — follows
//! `index.rs`'s `MGIndex` directly.

use crate::alphabet::Letter;
use crate::block::Block;
use crate::shape::{seed_at, shifted_seed_at, Reduction, Shape};

/// One (seed value, position) entry in a partition's sorted list. Position
/// packs a sequence-local offset; the caller resolves it back to
/// (block-local sequence index, offset) via the block's offset table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeedEntry {
    pub seed: u64,
    pub position: u64,
}

/// A sorted-by-seed-value array for one partition of one shape, plus a
/// histogram over the high bits of the seed for fast range lookup (spec
/// section 4.D: "sorted array + partition-histogram seed index").
#[derive(Clone)]
pub struct SortedList {
    pub shape: Shape,
    entries: Vec<SeedEntry>,
    /// histogram[b] = first index in `entries` whose seed's top
    /// `HISTOGRAM_BITS` equal b; length `2^HISTOGRAM_BITS + 1`.
    histogram: Vec<u32>,
}

const HISTOGRAM_BITS: u32 = 10;

impl SortedList {
    /// Builds a sorted list by seeding every valid window of every
    /// sequence in `block` under `shape`/`reduction`, using the identity
    /// seed function. This is the indexed side of spec section 4.C's
    /// identity/shifted pair — reference/subject blocks are indexed once
    /// and queried many times, so they use the plain window-start seeding.
    pub fn build(block: &Block, shape: &Shape, reduction: &Reduction) -> Self {
        Self::build_with(block, shape, reduction, seed_at)
    }

    /// Builds a sorted list using the shifted seed function (spec section
    /// 4.C), the streaming-index side of the identity/shifted pair. Used
    /// for the side of a match that's walked once per pass (the query
    /// block) rather than built once and searched repeatedly.
    pub fn build_streaming(block: &Block, shape: &Shape, reduction: &Reduction) -> Self {
        Self::build_with(block, shape, reduction, shifted_seed_at)
    }

    fn build_with(
        block: &Block,
        shape: &Shape,
        reduction: &Reduction,
        seed_fn: impl Fn(&[Letter], usize, &Shape, &Reduction) -> Option<u64>,
    ) -> Self {
        let mut entries = Vec::new();
        for seq_idx in 0..block.sequences.len() {
            let seq = block.sequences.get(seq_idx);
            let residues: &[Letter] = seq.residues();
            for pos in 0..residues.len() {
                if let Some(seed) = seed_fn(residues, pos, shape, reduction) {
                    let position = pack_position(seq_idx as u32, pos as u32);
                    entries.push(SeedEntry { seed, position });
                }
            }
        }
        entries.sort_unstable();
        let histogram = build_histogram(&entries);
        SortedList { shape: *shape, entries, histogram }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SeedEntry] {
        &self.entries
    }

    /// Returns the slice of entries whose seed's top bits place them in
    /// the same histogram bucket as `seed`, narrowing a subsequent linear
    /// or binary search.
    pub fn bucket_for(&self, seed: u64) -> &[SeedEntry] {
        let bucket = (seed >> (64 - HISTOGRAM_BITS)) as usize;
        let start = self.histogram[bucket] as usize;
        let end = self.histogram[bucket + 1] as usize;
        &self.entries[start..end]
    }

    /// Exact binary search for all entries matching `seed`.
    pub fn find(&self, seed: u64) -> &[SeedEntry] {
        let bucket = self.bucket_for(seed);
        let lo = bucket.partition_point(|e| e.seed < seed);
        let hi = bucket.partition_point(|e| e.seed <= seed);
        &bucket[lo..hi]
    }

    /// Seeds whose total occurrence count exceeds `max_count`: candidates
    /// for the frequent-seed filter (spec section 4.D), which skips
    /// expanding a seed that would flood the matcher with low-value hits.
    pub fn frequent_seeds(&self, max_count: usize) -> Vec<u64> {
        let mut result = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            let seed = self.entries[i].seed;
            let mut j = i;
            while j < self.entries.len() && self.entries[j].seed == seed {
                j += 1;
            }
            if j - i > max_count {
                result.push(seed);
            }
            i = j;
        }
        result
    }
}

fn build_histogram(entries: &[SeedEntry]) -> Vec<u32> {
    let buckets = 1usize << HISTOGRAM_BITS;
    let mut histogram = vec![0u32; buckets + 1];
    let mut bucket_idx = 0usize;
    for (i, e) in entries.iter().enumerate() {
        let b = (e.seed >> (64 - HISTOGRAM_BITS)) as usize;
        while bucket_idx <= b {
            histogram[bucket_idx] = i as u32;
            bucket_idx += 1;
        }
    }
    while bucket_idx <= buckets {
        histogram[bucket_idx] = entries.len() as u32;
        bucket_idx += 1;
    }
    histogram
}

pub fn pack_position(seq_idx: u32, offset: u32) -> u64 {
    ((seq_idx as u64) << 32) | offset as u64
}

pub fn unpack_position(position: u64) -> (u32, u32) {
    ((position >> 32) as u32, position as u32)
}

/// A frequent-seed exclusion set derived from one or more [`SortedList`]s,
/// consulted by the matcher before expanding any seed's postings (spec
/// section 4.D).
#[derive(Default, Clone)]
pub struct FrequentSeedSet {
    seeds: Vec<u64>,
}

impl FrequentSeedSet {
    pub fn from_lists(lists: &[SortedList], max_count: usize) -> Self {
        let mut seeds: Vec<u64> = lists.iter().flat_map(|l| l.frequent_seeds(max_count)).collect();
        seeds.sort_unstable();
        seeds.dedup();
        FrequentSeedSet { seeds }
    }

    pub fn contains(&self, seed: u64) -> bool {
        self.seeds.binary_search(&seed).is_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::Block;

    #[test]
    fn build_produces_sorted_entries() {
        let block = Block::load_protein(vec![("ARNDCQEGARNDCQEG", "t".to_string())]);
        let shape = Shape::contiguous(4);
        let reduction = Reduction::identity();
        let list = SortedList::build(&block, &shape, &reduction);
        assert!(list.entries().windows(2).all(|w| w[0].seed <= w[1].seed));
    }

    #[test]
    fn find_returns_only_matching_seeds() {
        let block = Block::load_protein(vec![("ARNDARND", "t".to_string())]);
        let shape = Shape::contiguous(4);
        let reduction = Reduction::identity();
        let list = SortedList::build(&block, &shape, &reduction);
        let target_seed = list.entries()[0].seed;
        let found = list.find(target_seed);
        assert!(found.iter().all(|e| e.seed == target_seed));
        assert!(!found.is_empty());
    }

    #[test]
    fn position_pack_roundtrips() {
        let (s, o) = unpack_position(pack_position(7, 42));
        assert_eq!((s, o), (7, 42));
    }

    #[test]
    fn streaming_build_matches_indexed_build_for_zero_offset_shapes() {
        let block = Block::load_protein(vec![("ARNDCQEGARNDCQEG", "t".to_string())]);
        let shape = Shape::contiguous(4);
        let reduction = Reduction::identity();
        let indexed = SortedList::build(&block, &shape, &reduction);
        let streaming = SortedList::build_streaming(&block, &shape, &reduction);
        assert_eq!(indexed.entries(), streaming.entries());
    }

    #[test]
    fn frequent_seed_set_flags_repeated_seed() {
        let block = Block::load_protein(vec![("AAAAAAAAAA", "t".to_string())]);
        let shape = Shape::contiguous(4);
        let reduction = Reduction::identity();
        let list = SortedList::build(&block, &shape, &reduction);
        let set = FrequentSeedSet::from_lists(&[list], 2);
        assert!(!set.seeds.is_empty());
    }
}
