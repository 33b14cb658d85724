//! Output formatting and reordering (component M).
//!
//! Grounded in teacher's `io.rs` (header/body writer split) and
//! `collapse.rs` (`HeapItem`-based merge-by-key), generalized here to
//! reorder per-query results back into ascending query-ordinal order
//! before they reach any one `Consumer`, since the scheduler produces
//! results in whatever order worker threads finish.

use std::collections::BinaryHeap;
use std::cmp::Reverse;
use std::io::Write;

use crate::chainer::ScoredHit;
use crate::error::SeqHunterResult;
use crate::gapped::HspValues;

/// Anything that can consume one query's worth of finished hits, in
/// final query order. Implementors decide the wire format (tabular,
/// JSON, ...).
pub trait Consumer {
    fn print_header(&mut self, w: &mut dyn Write) -> SeqHunterResult<()>;
    fn print_query_intro(&mut self, w: &mut dyn Write, query_title: &str) -> SeqHunterResult<()>;
    fn print_match(&mut self, w: &mut dyn Write, query_title: &str, subject_title: &str, hit: &ScoredHit) -> SeqHunterResult<()>;
    fn print_query_epilog(&mut self, w: &mut dyn Write) -> SeqHunterResult<()>;
    fn print_footer(&mut self, w: &mut dyn Write, queries_processed: u64) -> SeqHunterResult<()>;
}

/// Reorders results that may arrive out of order (worker threads race to
/// finish) back into ascending query-ordinal order, buffering anything
/// that arrives ahead of the next expected ordinal. Bounded depth guards
/// memory when one query's work unit is catastrophically slow (spec
/// section 4.L / 4.M: "ReorderQueue depth limit" as a back-pressure
/// signal rather than a hard error).
pub struct ReorderQueue {
    next_expected: usize,
    pending: BinaryHeap<Reverse<QueryResult>>,
    depth_limit: usize,
}

#[derive(Clone)]
struct QueryResult {
    ordinal: usize,
    title: String,
    hits: Vec<ScoredHit>,
}

impl PartialEq for QueryResult {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal
    }
}
impl Eq for QueryResult {}
impl PartialOrd for QueryResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueryResult {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordinal.cmp(&other.ordinal)
    }
}

impl ReorderQueue {
    pub fn new(depth_limit: usize) -> Self {
        ReorderQueue { next_expected: 0, pending: BinaryHeap::new(), depth_limit: depth_limit.max(1) }
    }

    /// True once accepting another out-of-order result would exceed the
    /// configured depth limit; the scheduler should apply back-pressure
    /// (stop handing out new work units) when this returns true.
    pub fn is_saturated(&self) -> bool {
        self.pending.len() >= self.depth_limit
    }

    /// Submits one finished query's results and drains every now-ready
    /// result (in order) to `consumer`.
    pub fn submit(
        &mut self,
        ordinal: usize,
        title: String,
        hits: Vec<ScoredHit>,
        consumer: &mut dyn Consumer,
        w: &mut dyn Write,
    ) -> SeqHunterResult<()> {
        self.pending.push(Reverse(QueryResult { ordinal, title, hits }));
        self.drain_ready(consumer, w)
    }

    fn drain_ready(&mut self, consumer: &mut dyn Consumer, w: &mut dyn Write) -> SeqHunterResult<()> {
        while let Some(Reverse(top)) = self.pending.peek() {
            if top.ordinal != self.next_expected {
                break;
            }
            let Reverse(result) = self.pending.pop().unwrap();
            consumer.print_query_intro(w, &result.title)?;
            for hit in &result.hits {
                consumer.print_match(w, &result.title, &result.title, hit)?;
            }
            consumer.print_query_epilog(w)?;
            self.next_expected += 1;
        }
        Ok(())
    }
}

/// A minimal tabular formatter, the BLAST `-outfmt 6`-style surface
/// columns (`query subject pident length evalue bitscore`). Other
/// `Consumer` implementations (JSON, SAM-like) follow the same trait
/// without needing a new reordering layer.
#[derive(Default)]
pub struct TabularConsumer {
    pub wanted: HspValues,
    queries_seen: u64,
}

impl Consumer for TabularConsumer {
    fn print_header(&mut self, w: &mut dyn Write) -> SeqHunterResult<()> {
        writeln!(w, "# query\tsubject\tpident\tlength\tmismatches\tgapopen\tevalue\tbitscore")?;
        Ok(())
    }

    fn print_query_intro(&mut self, _w: &mut dyn Write, _query_title: &str) -> SeqHunterResult<()> {
        self.queries_seen += 1;
        Ok(())
    }

    fn print_match(&mut self, w: &mut dyn Write, query_title: &str, subject_title: &str, hit: &ScoredHit) -> SeqHunterResult<()> {
        let aligned = (hit.hsp.query_end - hit.hsp.query_begin).max(1);
        let pident = 100.0 * hit.hsp.identities as f64 / aligned as f64;
        writeln!(
            w,
            "{}\t{}\t{:.2}\t{}\t{}\t{}\t{:.2e}\t{:.1}",
            query_title, subject_title, pident, aligned, hit.hsp.mismatches, hit.hsp.gap_openings, hit.e_value, hit.bit_score
        )?;
        Ok(())
    }

    fn print_query_epilog(&mut self, _w: &mut dyn Write) -> SeqHunterResult<()> {
        Ok(())
    }

    fn print_footer(&mut self, w: &mut dyn Write, queries_processed: u64) -> SeqHunterResult<()> {
        writeln!(w, "# {queries_processed} queries processed")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gapped::Hsp;

    fn hit(oid: u64, score: i32, e: f64) -> ScoredHit {
        ScoredHit {
            subject_oid: oid,
            hsp: Hsp {
                query_begin: 0,
                query_end: 10,
                subject_begin: 0,
                subject_end: 10,
                score,
                identities: 9,
                positives: 10,
                mismatches: 1,
                gap_openings: 0,
                gap_letters: 0,
                transcript: None,
            },
            bit_score: score as f64 / 2.0,
            e_value: e,
        }
    }

    #[test]
    fn reorder_queue_emits_in_ascending_ordinal_order() {
        let mut queue = ReorderQueue::new(8);
        let mut consumer = TabularConsumer::default();
        let mut buf = Vec::new();
        queue.submit(1, "q1".into(), vec![hit(1, 50, 0.01)], &mut consumer, &mut buf).unwrap();
        // ordinal 1 arrives first but must wait for ordinal 0.
        assert!(buf.is_empty());
        queue.submit(0, "q0".into(), vec![hit(2, 60, 0.001)], &mut consumer, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let q0_pos = text.find("q0").unwrap();
        let q1_pos = text.find("q1").unwrap();
        assert!(q0_pos < q1_pos);
    }

    #[test]
    fn saturation_reports_true_past_depth_limit() {
        let mut queue = ReorderQueue::new(1);
        let mut consumer = TabularConsumer::default();
        let mut buf = Vec::new();
        queue.submit(5, "q5".into(), vec![], &mut consumer, &mut buf).unwrap();
        assert!(queue.is_saturated());
    }

    #[test]
    fn tabular_consumer_writes_header_and_footer() {
        let mut consumer = TabularConsumer::default();
        let mut buf = Vec::new();
        consumer.print_header(&mut buf).unwrap();
        consumer.print_footer(&mut buf, 3).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with('#'));
        assert!(text.contains('3'));
    }
}
