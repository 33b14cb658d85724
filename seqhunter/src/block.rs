//! Reference/query blocks (component B, part 2: spec section 3 and 5).
//!
//! Grounded in teacher's `binner.rs`, which reads a FASTA/FASTQ source,
//! tracks per-record metadata, and hands batches to the worker pool;
//! extended here with six-frame translation, lazy low-complexity masking,
//! and the title/self-score bookkeeping the spec's `Block` needs.

use std::sync::Mutex;

use crate::alphabet::{amino_acid_to_letter, complement, nuc_to_letter, translate_codon, Letter, NucLetter, STOP};
use crate::masking::{apply_masks, seg_mask, tantan_mask, MaskRange};
use crate::seq::{Sequence, SequenceSet, StringSet};

/// One block of sequences loaded for a pass of the scheduler: either a
/// reference chunk or a query chunk (spec section 3). Protein blocks are
/// loaded directly; translated-DNA blocks additionally retain the source
/// nucleotide sequences so frame/coordinate mapping can recover the
/// original DNA position for a protein-space hit.
pub struct Block {
    pub sequences: SequenceSet,
    /// Present only when masking has been applied; holds the unmasked
    /// residues so `remove_soft_masking` / `fetch_seq_if_unmasked` can
    /// serve callers that need the original (spec section 5).
    unmasked: Option<SequenceSet>,
    /// Source DNA for translated-query blocks, one entry per frame-0
    /// input sequence (six frames all derive from the same source).
    pub dna_source: Option<Vec<Vec<NucLetter>>>,
    pub titles: StringSet,
    /// Block-local index -> database-wide object id; identity for a
    /// freshly built database, non-trivial when blocks are reloaded out
    /// of order.
    pub oids: Vec<u64>,
    pub self_scores: Option<Vec<i32>>,
    /// One bit per sequence: has lazy masking already been materialized
    /// for it? Mutex because masking happens cooperatively from worker
    /// threads (spec section 5).
    masked_bits: Mutex<Vec<bool>>,
}

impl Block {
    pub fn new(sequences: SequenceSet, titles: StringSet) -> Self {
        let n = sequences.len();
        Block {
            sequences,
            unmasked: None,
            dna_source: None,
            titles,
            oids: (0..n as u64).collect(),
            self_scores: None,
            masked_bits: Mutex::new(vec![false; n]),
        }
    }

    /// Builds a protein block directly from amino-acid text records.
    pub fn load_protein<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, String)>,
        S: AsRef<[u8]>,
    {
        let mut sequences = SequenceSet::new();
        let mut titles = StringSet::new();
        for (seq, title) in records {
            let letters: Vec<Letter> = seq.as_ref().iter().map(|&c| amino_acid_to_letter(c)).collect();
            sequences.push(&letters);
            titles.push(title.as_bytes());
        }
        Block::new(sequences, titles)
    }

    /// Six-frame translation of a DNA block: 3 forward, 3 reverse-complement
    /// frames per source sequence, each a single translated "sequence" in
    /// the resulting block, masking from the first in-frame stop onward so
    /// downstream seeding never crosses a real stop codon (spec section 5,
    /// "inter-stop masking").
    pub fn translate<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, String)>,
        S: AsRef<[u8]>,
    {
        let mut sequences = SequenceSet::new();
        let mut titles = StringSet::new();
        let mut dna_source = Vec::new();

        for (seq, title) in records {
            let dna: Vec<NucLetter> = seq.as_ref().iter().map(|&c| nuc_to_letter(c)).collect();
            let rev: Vec<NucLetter> = dna.iter().rev().map(|&b| complement(b)).collect();

            for (frame_idx, (strand, offset)) in [(&dna, 0usize), (&dna, 1), (&dna, 2), (&rev, 0), (&rev, 1), (&rev, 2)]
                .into_iter()
                .enumerate()
            {
                let translated = translate_frame(strand, offset);
                sequences.push(&translated);
                titles.push(format!("{} [frame {}]", title, frame_idx).as_bytes());
            }
            dna_source.push(dna);
        }

        let mut block = Block::new(sequences, titles);
        block.dna_source = Some(dna_source);
        block
    }

    /// Applies SEG and tantan masking to every sequence not yet masked,
    /// stashing the unmasked copy first so it can be restored later.
    pub fn soft_mask(&mut self) {
        if self.unmasked.is_none() {
            self.unmasked = Some(self.sequences.clone());
        }
        let mut masked_bits = self.masked_bits.lock().unwrap();
        for i in 0..self.sequences.len() {
            if masked_bits[i] {
                continue;
            }
            let ranges = self.mask_ranges_for(i);
            if !ranges.is_empty() {
                self.apply_mask_ranges(i, &ranges);
            }
            masked_bits[i] = true;
        }
    }

    fn mask_ranges_for(&self, i: usize) -> Vec<MaskRange> {
        let residues = self.sequences.get(i).residues().to_vec();
        let mut ranges = seg_mask(&residues, 12, 2.2);
        ranges.extend(tantan_mask(&residues, 4, 4.0));
        ranges
    }

    fn apply_mask_ranges(&mut self, i: usize, ranges: &[MaskRange]) {
        let mut residues = self.sequences.get(i).residues().to_vec();
        apply_masks(&mut residues, ranges);
        self.sequences.set_residues(i, &residues);
    }

    /// Restores the pre-masking residues for every sequence, a no-op if
    /// masking was never applied (idempotent per spec section 5).
    pub fn remove_soft_masking(&mut self) {
        if let Some(unmasked) = self.unmasked.take() {
            self.sequences = unmasked;
            let mut bits = self.masked_bits.lock().unwrap();
            bits.iter_mut().for_each(|b| *b = false);
        }
    }

    /// Returns the unmasked view of sequence `i` if available, else the
    /// (possibly already-masked) current view — the cooperative-lazy-read
    /// path described in spec section 5.
    pub fn fetch_seq_if_unmasked(&self, i: usize) -> Sequence<'_> {
        match &self.unmasked {
            Some(u) => u.get(i),
            None => self.sequences.get(i),
        }
    }

    /// Normalizes a title the way DB titles are recorded: trims
    /// whitespace, drops anything after the first null byte.
    pub fn fix_title(raw: &str) -> String {
        raw.split('\0').next().unwrap_or("").trim().to_string()
    }
}

fn translate_frame(strand: &[NucLetter], offset: usize) -> Vec<Letter> {
    let mut out = Vec::new();
    let mut i = offset;
    let mut hit_stop = false;
    while i + 3 <= strand.len() {
        if hit_stop {
            out.push(crate::alphabet::MASK);
        } else {
            let aa = translate_codon(strand[i], strand[i + 1], strand[i + 2]);
            if aa == STOP {
                hit_stop = true;
                out.push(crate::alphabet::MASK);
            } else {
                out.push(aa);
            }
        }
        i += 3;
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn translate_produces_six_frames_per_source() {
        let block = Block::translate(vec![("ATGAAATAG", "seq1".to_string())]);
        assert_eq!(block.sequences.len(), 6);
        assert_eq!(block.dna_source.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn frame_zero_translates_atg_to_methionine() {
        let block = Block::translate(vec![("ATGAAATAG", "seq1".to_string())]);
        let frame0 = block.sequences.get(0);
        assert_eq!(crate::alphabet::letter_to_amino_acid(frame0.get(0)), b'M');
    }

    #[test]
    fn load_protein_preserves_titles() {
        let block = Block::load_protein(vec![("ARND", "first".to_string()), ("CQEG", "second".to_string())]);
        assert_eq!(block.titles.get(0), b"first");
        assert_eq!(block.titles.get(1), b"second");
    }

    #[test]
    fn fix_title_trims_and_truncates_at_null() {
        assert_eq!(Block::fix_title("  hello world \0 garbage"), "hello world");
    }

    #[test]
    fn soft_mask_then_remove_restores_original_residues() {
        let mut block = Block::load_protein(vec![("AAAAAAAAAAAACQEG", "t".to_string())]);
        let before = block.sequences.get(0).residues().to_vec();
        block.soft_mask();
        block.remove_soft_masking();
        assert_eq!(block.sequences.get(0).residues(), before.as_slice());
    }

    #[test]
    fn remove_soft_masking_is_a_no_op_before_masking() {
        let mut block = Block::load_protein(vec![("ARNDCQEG", "t".to_string())]);
        let before = block.sequences.get(0).residues().to_vec();
        block.remove_soft_masking();
        assert_eq!(block.sequences.get(0).residues(), before.as_slice());
    }
}
