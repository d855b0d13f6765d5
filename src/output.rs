//! File-backed record sink: JSON Lines for records, pretty JSON for the report.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use registry_search::types::Record;
use registry_search::{RecordSink, RunReport, SearchError};

use crate::config::OutputConfig;
use crate::error::{Result, ScoutError};

/// Appends one JSON object per line as records arrive and writes the
/// final report to its own file.
///
/// Each record is flushed before `emit_record` returns, so an interrupted
/// run leaves every record found so far on disk.
#[derive(Debug)]
pub struct JsonLinesSink {
    records: BufWriter<File>,
    records_path: PathBuf,
    report_path: PathBuf,
    written: usize,
}

impl JsonLinesSink {
    /// Open (or create) the records file for appending.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Output`] if the records file or its parent
    /// directory cannot be created.
    pub fn open(records_path: &Path, report_path: &Path) -> Result<Self> {
        create_parent(records_path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(records_path)
            .map_err(|e| {
                ScoutError::Output(format!("cannot open {}: {e}", records_path.display()))
            })?;
        Ok(Self {
            records: BufWriter::new(file),
            records_path: records_path.to_path_buf(),
            report_path: report_path.to_path_buf(),
            written: 0,
        })
    }

    pub fn from_config(config: &OutputConfig) -> Result<Self> {
        Self::open(&config.records_path, &config.report_path)
    }

    /// Records written by this sink so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| ScoutError::Output(format!("cannot create {}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

fn sink_error(path: &Path, err: impl std::fmt::Display) -> SearchError {
    SearchError::Sink(format!("{}: {err}", path.display()))
}

impl RecordSink for JsonLinesSink {
    fn emit_record(&mut self, record: &Record) -> std::result::Result<(), SearchError> {
        let line = serde_json::to_string(record).map_err(|e| sink_error(&self.records_path, e))?;
        writeln!(self.records, "{line}").map_err(|e| sink_error(&self.records_path, e))?;
        self.records
            .flush()
            .map_err(|e| sink_error(&self.records_path, e))?;
        self.written += 1;
        tracing::trace!(written = self.written, "record appended");
        Ok(())
    }

    fn emit_report(&mut self, report: &RunReport) -> std::result::Result<(), SearchError> {
        create_parent(&self.report_path).map_err(|e| sink_error(&self.report_path, e))?;
        let json =
            serde_json::to_string_pretty(report).map_err(|e| sink_error(&self.report_path, e))?;
        std::fs::write(&self.report_path, json).map_err(|e| sink_error(&self.report_path, e))?;
        tracing::info!(path = %self.report_path.display(), "report written");
        Ok(())
    }
}
