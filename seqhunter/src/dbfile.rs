//! Native binary database file format (spec section 6).
//!
//! Grounded in teacher's `io.rs` (`parse_header_mapping`,
//! `bincode::serialize_into`/`deserialize_from` against a tagged header
//! struct) for the header-then-body shape, and in
//! `examples/original_source/src/data/taxon_list.h` (via `_INDEX.md`) for
//! the optional taxon-id list section.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{SeqHunterError, SeqHunterResult};
use crate::seq::{SequenceSet, StringSet};

pub const MAGIC: u32 = 0x5348_4442; // "SHDB"
pub const FORMAT_VERSION: u32 = 1;

/// Primary header: the first thing read when opening a database, enough
/// to validate the file and locate every other section (spec section 6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrimaryHeader {
    pub magic: u32,
    pub build_version: u32,
    pub format_version: u32,
    pub sequence_count: u64,
    pub letter_count: u64,
    pub position_table_offset: u64,
}

/// Secondary header: a checksum over the sequence area plus optional
/// taxonomy section offsets (0 meaning "absent").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecondaryHeader {
    pub murmur3_hash: u64,
    pub taxon_list_offset: u64,
    pub taxonomy_nodes_offset: u64,
    pub taxonomy_names_offset: u64,
}

/// A minimal taxon-id list: one taxon id per sequence, 0 meaning
/// unassigned (spec section 10, item 9).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaxonList {
    pub taxon_ids: Vec<u32>,
}

impl TaxonList {
    pub fn get(&self, oid: usize) -> u32 {
        self.taxon_ids.get(oid).copied().unwrap_or(0)
    }
}

fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes(chunk.try_into().unwrap());
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut k = 0u32;
        for (i, &b) in remainder.iter().enumerate() {
            k |= (b as u32) << (8 * i);
        }
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }
    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// A fully built database ready to serialize: sequences, titles, and
/// optional taxonomy metadata (spec section 6).
pub struct Database {
    pub sequences: SequenceSet,
    pub titles: StringSet,
    pub taxon_list: Option<TaxonList>,
    pub build_version: u32,
}

impl Database {
    pub fn write(&self, mut w: impl Write) -> SeqHunterResult<()> {
        let sequence_bytes = self.sequences.raw();
        let hash = murmur3_32(sequence_bytes, 0) as u64;

        let primary = PrimaryHeader {
            magic: MAGIC,
            build_version: self.build_version,
            format_version: FORMAT_VERSION,
            sequence_count: self.sequences.len() as u64,
            letter_count: self.sequences.total_letters(),
            position_table_offset: 0, // filled below once known
        };
        bincode::serialize_into(&mut w, &primary).map_err(SeqHunterError::Serialize)?;

        let secondary = SecondaryHeader {
            murmur3_hash: hash,
            taxon_list_offset: if self.taxon_list.is_some() { 1 } else { 0 },
            taxonomy_nodes_offset: 0,
            taxonomy_names_offset: 0,
        };
        bincode::serialize_into(&mut w, &secondary).map_err(SeqHunterError::Serialize)?;

        w.write_all(sequence_bytes)?;
        w.write_all(self.titles.raw())?;

        if let Some(taxon_list) = &self.taxon_list {
            bincode::serialize_into(&mut w, taxon_list).map_err(SeqHunterError::Serialize)?;
        }
        Ok(())
    }
}

/// Reads the primary/secondary headers and validates the magic number and
/// format version, without yet materializing the (much larger) sequence
/// area — callers that only need metadata (e.g. a `--dbinfo` style
/// command) can stop here.
pub fn read_headers(mut r: impl Read) -> SeqHunterResult<(PrimaryHeader, SecondaryHeader)> {
    let primary: PrimaryHeader = bincode::deserialize_from(&mut r).map_err(SeqHunterError::Serialize)?;
    if primary.magic != MAGIC {
        return Err(SeqHunterError::InvalidDatabase("bad magic number".into()));
    }
    if primary.format_version != FORMAT_VERSION {
        return Err(SeqHunterError::InvalidDatabase(format!(
            "unsupported format version {} (expected {})",
            primary.format_version, FORMAT_VERSION
        )));
    }
    let secondary: SecondaryHeader = bincode::deserialize_from(&mut r).map_err(SeqHunterError::Serialize)?;
    Ok((primary, secondary))
}

/// Reads the full database: headers plus the reconstructed sequence and
/// title areas, and the optional taxon list (spec section 6). The sequence
/// area's byte length follows from the header (`letter_count` residues
/// plus one trailing sentinel per sequence); the title area has no stored
/// length, so it's read one byte at a time until `sequence_count` NUL
/// terminators have been seen, matching the structure `Database::write`
/// actually produces.
pub fn read_block(mut r: impl Read) -> SeqHunterResult<(PrimaryHeader, SecondaryHeader, SequenceSet, StringSet, Option<TaxonList>)> {
    let (primary, secondary) = read_headers(&mut r)?;
    let count = primary.sequence_count as usize;

    let sequence_byte_len = (primary.letter_count + primary.sequence_count) as usize;
    let mut sequence_bytes = vec![0u8; sequence_byte_len];
    r.read_exact(&mut sequence_bytes)?;
    let sequences = SequenceSet::from_raw_parts(sequence_bytes, count);

    let mut title_bytes = Vec::new();
    let mut terminators_seen = 0usize;
    let mut byte = [0u8; 1];
    while terminators_seen < count {
        r.read_exact(&mut byte)?;
        title_bytes.push(byte[0]);
        if byte[0] == 0 {
            terminators_seen += 1;
        }
    }
    let titles = StringSet::from_raw_parts(title_bytes, count);

    let taxon_list = if secondary.taxon_list_offset != 0 {
        Some(bincode::deserialize_from(&mut r).map_err(SeqHunterError::Serialize)?)
    } else {
        None
    };

    Ok((primary, secondary, sequences, titles, taxon_list))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_then_read_headers_roundtrips() {
        let mut sequences = SequenceSet::new();
        sequences.push(&[0, 1, 2, 3]);
        let mut titles = StringSet::new();
        titles.push(b"seq1");
        let db = Database { sequences, titles, taxon_list: None, build_version: 7 };

        let mut buf = Vec::new();
        db.write(&mut buf).unwrap();

        let (primary, secondary) = read_headers(&buf[..]).unwrap();
        assert_eq!(primary.magic, MAGIC);
        assert_eq!(primary.sequence_count, 1);
        assert_eq!(primary.build_version, 7);
        assert_eq!(secondary.taxon_list_offset, 0);
    }

    #[test]
    fn rejects_bad_magic() {
        let garbage = vec![0u8; 64];
        assert!(read_headers(&garbage[..]).is_err());
    }

    #[test]
    fn taxon_list_roundtrips_when_present() {
        let mut sequences = SequenceSet::new();
        sequences.push(&[0, 1]);
        let titles = StringSet::new();
        let taxon_list = TaxonList { taxon_ids: vec![9606] };
        let db = Database { sequences, titles, taxon_list: Some(taxon_list), build_version: 1 };
        let mut buf = Vec::new();
        db.write(&mut buf).unwrap();
        let (_, secondary) = read_headers(&buf[..]).unwrap();
        assert_eq!(secondary.taxon_list_offset, 1);
    }

    #[test]
    fn write_then_read_block_roundtrips_sequences_and_titles() {
        let mut sequences = SequenceSet::new();
        sequences.push(&[0, 1, 2, 3]);
        sequences.push(&[4, 5]);
        let mut titles = StringSet::new();
        titles.push(b"seq1");
        titles.push(b"seq2");
        let db = Database { sequences, titles, taxon_list: None, build_version: 3 };

        let mut buf = Vec::new();
        db.write(&mut buf).unwrap();

        let (primary, _secondary, sequences, titles, taxon_list) = read_block(&buf[..]).unwrap();
        assert_eq!(primary.sequence_count, 2);
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences.get(0).residues(), &[0, 1, 2, 3]);
        assert_eq!(sequences.get(1).residues(), &[4, 5]);
        assert_eq!(titles.get(0), b"seq1");
        assert_eq!(titles.get(1), b"seq2");
        assert!(taxon_list.is_none());
    }

    #[test]
    fn write_then_read_block_roundtrips_taxon_list() {
        let mut sequences = SequenceSet::new();
        sequences.push(&[0, 1]);
        let mut titles = StringSet::new();
        titles.push(b"seq1");
        let taxon_list = TaxonList { taxon_ids: vec![9606] };
        let db = Database { sequences, titles, taxon_list: Some(taxon_list), build_version: 1 };

        let mut buf = Vec::new();
        db.write(&mut buf).unwrap();

        let (_, _, _, _, taxon_list) = read_block(&buf[..]).unwrap();
        assert_eq!(taxon_list.unwrap().get(0), 9606);
    }

    #[test]
    fn murmur3_is_deterministic() {
        assert_eq!(murmur3_32(b"hello world", 0), murmur3_32(b"hello world", 0));
        assert_ne!(murmur3_32(b"hello world", 0), murmur3_32(b"hello worlx", 0));
    }
}
