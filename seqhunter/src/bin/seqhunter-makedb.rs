//! `seqhunter-makedb`: builds a native database file from a FASTA source.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};

use clap::{App, Arg};

use seqhunter::alphabet::amino_acid_to_letter;
use seqhunter::dbfile::Database;
use seqhunter::error::{SeqHunterError, SeqHunterResult};
use seqhunter::seq::{SequenceSet, StringSet};

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> SeqHunterResult<()> {
    let matches = App::new("seqhunter-makedb")
        .arg(Arg::with_name("in").long("in").short("i").takes_value(true).required(true).help("source FASTA file"))
        .arg(Arg::with_name("db").long("db").short("d").takes_value(true).required(true).help("output database path"))
        .get_matches();

    let in_path = matches.value_of("in").unwrap();
    let db_path = matches.value_of("db").unwrap();

    log::info!("reading {in_path}");
    let reader = BufReader::new(File::open(in_path)?);

    let mut sequences = SequenceSet::new();
    let mut titles = StringSet::new();
    let mut title = String::new();
    let mut residues: Vec<u8> = Vec::new();
    let mut seq_count = 0u64;

    let mut flush = |title: &mut String, residues: &mut Vec<u8>, sequences: &mut SequenceSet, titles: &mut StringSet| -> SeqHunterResult<()> {
        if residues.is_empty() {
            return Err(SeqHunterError::InvalidQueries(format!("sequence '{title}' is empty")));
        }
        let letters: Vec<u8> = residues.iter().map(|&c| amino_acid_to_letter(c)).collect();
        sequences.push(&letters);
        titles.push(title.as_bytes());
        residues.clear();
        Ok(())
    };

    for line in reader.lines() {
        let line = line?;
        if let Some(rest) = line.strip_prefix('>') {
            if !title.is_empty() {
                flush(&mut title, &mut residues, &mut sequences, &mut titles)?;
                seq_count += 1;
            }
            title = rest.to_string();
        } else {
            residues.extend(line.bytes());
        }
    }
    if !title.is_empty() {
        flush(&mut title, &mut residues, &mut sequences, &mut titles)?;
        seq_count += 1;
    }

    log::info!("writing {seq_count} sequences to {db_path}");
    let db = Database { sequences, titles, taxon_list: None, build_version: 1 };
    let writer = BufWriter::new(File::create(db_path)?);
    db.write(writer)?;
    Ok(())
}
