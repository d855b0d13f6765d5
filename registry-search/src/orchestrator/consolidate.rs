//! Cross-strategy deduplication.
//!
//! Records are keyed by their whitespace-collapsed full text. The first
//! strategy to produce a key owns the record; later hits are dropped
//! without touching any counter.

use std::collections::HashSet;

use chrono::Utc;

use super::report::RunMetrics;
use crate::extract::collapse_whitespace;
use crate::sink::RecordSink;
use crate::strategy::Strategy;
use crate::types::{ExtractedRow, Provenance, Record};

/// Dedup key of an extracted row.
pub fn dedup_key(row: &ExtractedRow) -> String {
    collapse_whitespace(&row.full_text)
}

/// Owns the seen-key set and the growing record collection for one run.
#[derive(Debug)]
pub struct Consolidator {
    seen: HashSet<String>,
    records: Vec<Record>,
    source: String,
}

impl Consolidator {
    /// `source` is stamped into every record's provenance.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            seen: HashSet::new(),
            records: Vec::new(),
            source: source.into(),
        }
    }

    /// Merge one strategy's rows, in order, emitting each new record
    /// before looking at the next row.
    ///
    /// Returns how many records were new.
    pub fn absorb<S: RecordSink>(
        &mut self,
        strategy: &Strategy,
        rows: Vec<ExtractedRow>,
        metrics: &mut RunMetrics,
        sink: &mut S,
    ) -> usize {
        let mut added = 0;
        for row in rows {
            let key = dedup_key(&row);
            if self.seen.contains(&key) {
                tracing::trace!(strategy = %strategy.kind, "duplicate record dropped");
                continue;
            }

            let record = Record {
                row,
                provenance: Provenance {
                    strategy_id: strategy.id().to_string(),
                    strategy: strategy.description.clone(),
                    term: strategy.term.clone(),
                    weight: strategy.weight,
                    extracted_at: Utc::now(),
                    source: self.source.clone(),
                    parameters: strategy.parameters.clone(),
                },
                details: None,
            };
            self.seen.insert(key);
            metrics.records_found += 1;
            added += 1;

            if let Err(err) = sink.emit_record(&record) {
                tracing::warn!(error = %err, "failed to emit record");
            }
            self.records.push(record);
        }
        added
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
