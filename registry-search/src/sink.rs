//! Output sinks for streamed records and the final report.
//!
//! Records are emitted one at a time, the moment they are consolidated, so
//! partial output survives an interrupted run.

use crate::error::SearchError;
use crate::orchestrator::RunReport;
use crate::types::Record;

/// Destination for run output.
pub trait RecordSink {
    /// Emit one newly consolidated record.
    fn emit_record(&mut self, record: &Record) -> Result<(), SearchError>;

    /// Emit the final report, once, after enrichment and ordering.
    fn emit_report(&mut self, report: &RunReport) -> Result<(), SearchError>;
}

impl<T: RecordSink + ?Sized> RecordSink for &mut T {
    fn emit_record(&mut self, record: &Record) -> Result<(), SearchError> {
        (**self).emit_record(record)
    }

    fn emit_report(&mut self, report: &RunReport) -> Result<(), SearchError> {
        (**self).emit_report(report)
    }
}

/// Keeps everything in memory. Mostly useful in tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
    pub reports: Vec<RunReport>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for MemorySink {
    fn emit_record(&mut self, record: &Record) -> Result<(), SearchError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn emit_report(&mut self, report: &RunReport) -> Result<(), SearchError> {
        self.reports.push(report.clone());
        Ok(())
    }
}
