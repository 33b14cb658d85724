//! `seqhunter-search`: runs a query file against a prebuilt database.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use seqhunter::block::Block;
use seqhunter::config::{build_cli, Config, SearchMode};
use seqhunter::dbfile::read_block;
use seqhunter::dictionary::Dictionary;
use seqhunter::error::{FatalErrors, SeqHunterResult, WarningLog};
use seqhunter::output::{Consumer, ReorderQueue, TabularConsumer};
use seqhunter::scheduler::{run_query_against_database, SchedulerParams};
use seqhunter::scoring::ScoreMatrix;
use seqhunter::shape::{shapes_for_sensitivity, Reduction};
use seqhunter_pipeline::Cancellation;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> SeqHunterResult<()> {
    let matches = build_cli("seqhunter-search").get_matches();
    let config = Config::from_args(&matches)?;

    log::info!("loading query from {}", config.query_path);
    let query_records = read_fasta(&config.query_path)?;
    let query_block = match config.mode {
        SearchMode::ProteinProtein => Block::load_protein(query_records),
        SearchMode::TranslatedQuery => Block::translate(query_records),
    };

    log::info!("opening database {}", config.db_path);
    let db_file = File::open(&config.db_path)?;
    let (primary, _secondary, sequences, titles, taxon_list) = read_block(BufReader::new(db_file))?;
    if let Some(taxon_list) = &taxon_list {
        log::info!("database carries a taxon list ({} entries)", taxon_list.taxon_ids.len());
    }
    let ref_block = Block::new(sequences, titles);

    let matrix = ScoreMatrix::blosum62(config.gap_open, config.gap_extend, config.cbs);
    let shapes = shapes_for_sensitivity(config.sensitivity);
    let shape = shapes[0];

    let params = SchedulerParams {
        matrix: &matrix,
        shape,
        reduction: Reduction::identity(),
        x_drop: config.x_drop,
        band_width: config.band_width,
        band_for_culling: 2,
        rank_ratio: config.rank_ratio,
        max_targets: config.max_target_seqs,
        filters: config.filters,
        db_sequence_count: primary.sequence_count,
        db_total_letters: primary.letter_count,
    };

    let dictionary = Dictionary::new();
    let warnings = WarningLog::new();
    let fatal_errors = FatalErrors::new();
    let cancel = Cancellation::new();

    let results = run_query_against_database(&query_block, &[ref_block], &params, config.threads, &dictionary, &warnings, &fatal_errors, &cancel);

    if let Some(err) = fatal_errors.take_first() {
        return Err(err);
    }

    let mut out: Box<dyn Write> = match &config.output_path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };

    let mut consumer = TabularConsumer::default();
    let mut reorder = ReorderQueue::new(config.threads * 4 + 4);
    consumer.print_header(out.as_mut())?;
    for (ordinal, hits) in results {
        let title = format!("query_{ordinal}");
        reorder.submit(ordinal, title, hits, &mut consumer, out.as_mut())?;
    }
    consumer.print_footer(out.as_mut(), query_block.sequences.len() as u64)?;

    warnings.flush();
    if !warnings.is_empty() {
        log::warn!("completed with {} warnings", warnings.len());
    }
    Ok(())
}

fn read_fasta(path: &str) -> SeqHunterResult<Vec<(Vec<u8>, String)>> {
    use std::io::BufRead;
    let reader: Box<dyn BufRead> = if path.ends_with(".gz") {
        Box::new(BufReader::new(flate2::read::GzDecoder::new(File::open(path)?)))
    } else {
        Box::new(BufReader::new(File::open(path)?))
    };

    let mut records = Vec::new();
    let mut title = String::new();
    let mut seq: Vec<u8> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(rest) = line.strip_prefix('>') {
            if !title.is_empty() || !seq.is_empty() {
                records.push((std::mem::take(&mut seq), std::mem::take(&mut title)));
            }
            title = rest.to_string();
        } else {
            seq.extend(line.bytes());
        }
    }
    if !title.is_empty() || !seq.is_empty() {
        records.push((seq, title));
    }
    Ok(records)
}
