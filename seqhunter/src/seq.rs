//! Sequence data model (component B, part 1: spec section 3).
//!
//! Grounded in teacher's `index.rs`, which packs many sequences into one
//! flat buffer with an offset table (see `MGIndex`'s concatenated
//! reference). Extended here with the sentinel-bracketing scheme the spec
//! requires: every individual sequence is terminated by a trailing
//! [`crate::alphabet::SENTINEL`] so DP and seed code can scan across
//! sequence boundaries safely by checking for the sentinel letter rather
//! than carrying bounds everywhere.

use crate::alphabet::{Letter, SENTINEL};

/// A single sequence, viewed as a sentinel-bracketed slice inside a larger
/// packed buffer. Borrows from the owning [`SequenceSet`]; never owns its
/// own letters.
#[derive(Clone, Copy, Debug)]
pub struct Sequence<'a> {
    letters: &'a [Letter],
}

impl<'a> Sequence<'a> {
    /// `letters` must already include the trailing sentinel.
    pub fn from_bracketed(letters: &'a [Letter]) -> Self {
        debug_assert_eq!(*letters.last().unwrap_or(&SENTINEL), SENTINEL);
        Sequence { letters }
    }

    /// Length excluding the trailing sentinel.
    pub fn len(&self) -> usize {
        self.letters.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn residues(&self) -> &'a [Letter] {
        &self.letters[..self.len()]
    }

    pub fn get(&self, i: usize) -> Letter {
        self.letters[i]
    }
}

/// Many sequences packed into one contiguous buffer, each bracketed by a
/// trailing sentinel, plus an offset table giving the start of every
/// sequence (spec section 3: "packed concatenation + offset table").
/// `offsets[i]` is the start of sequence `i`'s residues; `offsets[i+1]`
/// is one past its trailing sentinel.
#[derive(Clone, Debug, Default)]
pub struct SequenceSet {
    data: Vec<Letter>,
    offsets: Vec<u64>, // offsets[i]..offsets[i+1] is sequence i (incl. trailing sentinel)
}

impl SequenceSet {
    pub fn new() -> Self {
        SequenceSet { data: Vec::new(), offsets: vec![0] }
    }

    /// Appends one sequence's residues, bracketing with a trailing
    /// sentinel, and records its offset.
    pub fn push(&mut self, residues: &[Letter]) {
        self.data.extend_from_slice(residues);
        self.data.push(SENTINEL);
        self.offsets.push(self.data.len() as u64);
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Sequence<'_> {
        let start = self.offsets[i] as usize;
        let end = self.offsets[i + 1] as usize;
        Sequence::from_bracketed(&self.data[start..end])
    }

    /// Total residue count across every sequence, used for effective
    /// search space calculations (component J).
    pub fn total_letters(&self) -> u64 {
        // One trailing sentinel per sequence; `offsets.len() - 1` is the
        // sequence count.
        self.data.len() as u64 - (self.offsets.len() as u64 - 1)
    }

    pub fn raw(&self) -> &[Letter] {
        &self.data
    }

    /// Reconstructs a `SequenceSet` from raw packed+sentinel-bracketed
    /// bytes, the inverse of repeated [`SequenceSet::push`] calls (spec
    /// section 6: the database file stores exactly this byte stream,
    /// without a separate offset table). `SENTINEL` never occurs as a
    /// residue value, so each occurrence in `data` marks exactly one
    /// sequence boundary; `count` is a consistency check against the
    /// caller's own record of how many sequences were written.
    pub fn from_raw_parts(data: Vec<Letter>, count: usize) -> Self {
        let mut offsets = Vec::with_capacity(count + 1);
        offsets.push(0u64);
        for (i, &b) in data.iter().enumerate() {
            if b == SENTINEL {
                offsets.push((i + 1) as u64);
            }
        }
        debug_assert_eq!(offsets.len(), count + 1, "sentinel count disagrees with recorded sequence count");
        SequenceSet { data, offsets }
    }

    /// Overwrites sequence `i`'s residues in place (length must match).
    /// Used by masking, which replaces flagged residues without changing
    /// any sequence's length or shifting later offsets.
    pub fn set_residues(&mut self, i: usize, residues: &[Letter]) {
        let start = self.offsets[i] as usize;
        let end = self.offsets[i + 1] as usize;
        let seq_len = end - start - 1; // exclude trailing sentinel
        assert_eq!(residues.len(), seq_len, "set_residues must preserve sequence length");
        self.data[start..start + seq_len].copy_from_slice(residues);
    }

    /// 32-bit vs 64-bit position dichotomy (spec section 3): sets whose
    /// packed buffer stays under 2^32 letters can use 32-bit position
    /// encoding for seed hits; larger ones need 64-bit.
    pub fn needs_wide_positions(&self) -> bool {
        self.data.len() as u64 > u32::MAX as u64
    }
}

/// A parallel set of variable-length byte strings (titles, accessions),
/// packed the same way as [`SequenceSet`] but NUL-terminated rather than
/// sentinel-bracketed, matching the DB file format (spec section 6).
#[derive(Clone, Debug, Default)]
pub struct StringSet {
    data: Vec<u8>,
    offsets: Vec<u64>,
}

impl StringSet {
    pub fn new() -> Self {
        StringSet { data: Vec::new(), offsets: vec![0] }
    }

    pub fn push(&mut self, s: &[u8]) {
        self.data.extend_from_slice(s);
        self.data.push(0);
        self.offsets.push(self.data.len() as u64);
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn get(&self, i: usize) -> &[u8] {
        let start = self.offsets[i] as usize;
        let end = self.offsets[i + 1] as usize;
        &self.data[start..end - 1] // drop the NUL
    }

    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    /// Reconstructs a `StringSet` from raw NUL-terminated bytes, the
    /// inverse of repeated [`StringSet::push`] calls (spec section 6).
    /// Title bytes never contain a literal NUL, so each occurrence marks
    /// exactly one string boundary.
    pub fn from_raw_parts(data: Vec<u8>, count: usize) -> Self {
        let mut offsets = Vec::with_capacity(count + 1);
        offsets.push(0u64);
        for (i, &b) in data.iter().enumerate() {
            if b == 0 {
                offsets.push((i + 1) as u64);
            }
        }
        debug_assert_eq!(offsets.len(), count + 1, "NUL count disagrees with recorded string count");
        StringSet { data, offsets }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn push_then_get_returns_exactly_what_was_pushed(records: Vec<Vec<u8>>) -> bool {
        let capped: Vec<Vec<Letter>> = records.into_iter().map(|r| r.into_iter().map(|b| b % 24).collect()).collect();
        let mut set = SequenceSet::new();
        for r in &capped {
            set.push(r);
        }
        capped.iter().enumerate().all(|(i, r)| set.get(i).residues() == r.as_slice())
    }

    #[test]
    fn push_and_get_roundtrip() {
        let mut set = SequenceSet::new();
        set.push(&[1, 2, 3]);
        set.push(&[4, 5]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).residues(), &[1, 2, 3]);
        assert_eq!(set.get(1).residues(), &[4, 5]);
        assert_eq!(set.get(0).get(3), SENTINEL);
    }

    #[test]
    fn empty_sequence_is_just_sentinel() {
        let mut set = SequenceSet::new();
        set.push(&[]);
        assert_eq!(set.get(0).len(), 0);
        assert!(set.get(0).is_empty());
    }

    #[test]
    fn total_letters_excludes_sentinels() {
        let mut set = SequenceSet::new();
        set.push(&[1, 2, 3]);
        set.push(&[4, 5]);
        assert_eq!(set.total_letters(), 5);
    }

    #[test]
    fn string_set_roundtrip() {
        let mut set = StringSet::new();
        set.push(b"hello");
        set.push(b"world");
        assert_eq!(set.get(0), b"hello");
        assert_eq!(set.get(1), b"world");
    }

    #[test]
    fn sequence_set_reconstructs_from_raw_bytes() {
        let mut set = SequenceSet::new();
        set.push(&[1, 2, 3]);
        set.push(&[]);
        set.push(&[4, 5]);
        let rebuilt = SequenceSet::from_raw_parts(set.raw().to_vec(), set.len());
        assert_eq!(rebuilt.len(), set.len());
        for i in 0..set.len() {
            assert_eq!(rebuilt.get(i).residues(), set.get(i).residues());
        }
    }

    #[test]
    fn string_set_reconstructs_from_raw_bytes() {
        let mut set = StringSet::new();
        set.push(b"hello");
        set.push(b"world");
        let rebuilt = StringSet::from_raw_parts(set.raw().to_vec(), set.len());
        assert_eq!(rebuilt.get(0), b"hello");
        assert_eq!(rebuilt.get(1), b"world");
    }
}
