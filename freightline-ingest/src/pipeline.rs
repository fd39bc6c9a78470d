//! Stream ingestion pipeline
//!
//! Drives one source file end to end: decode → validate → buffer → bulk
//! load → archive. Per-record problems (undecodable elements, predicate
//! rejections) are collected for the invalid quarantine and never abort
//! the scan; a buffer that exhausts its load retries is quarantined by the
//! loader and the file is reported incomplete so it can be re-run.

use crate::buffer::RowBuffer;
use crate::config::IngestConfig;
use crate::loader::{BulkLoader, LoadOutcome};
use crate::metrics::RECORDS_QUARANTINED_TOTAL;
use crate::quarantine::Quarantine;
use crate::retry::RetryPolicy;
use crate::stream::{JsonArrayStream, StreamItem};
use crate::Result;
use freightline_core::{SourceTable, ValidateFn};
use freightline_storage::PgStore;
use serde_json::json;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Outcome of processing one source file
#[derive(Debug)]
pub struct FileReport {
    pub table: SourceTable,

    /// Records accepted into buffers
    pub records: u64,

    /// Rows committed to the permanent table
    pub loaded: u64,

    /// Records routed to the invalid quarantine
    pub invalid: u64,

    /// Buffers quarantined after exhausting load retries
    pub failed_batches: u32,

    /// Whether the source file was moved to the archive
    pub archived: bool,
}

impl FileReport {
    fn new(table: SourceTable) -> Self {
        Self {
            table,
            records: 0,
            loaded: 0,
            invalid: 0,
            failed_batches: 0,
            archived: false,
        }
    }

    /// Whether every buffer of the file was committed
    pub fn is_complete(&self) -> bool {
        self.failed_batches == 0
    }
}

/// File-to-table ingestion pipeline for the plain (non-staged) path
pub struct StreamPipeline {
    loader: BulkLoader,
    quarantine: Quarantine,
    batch_size: usize,
}

impl StreamPipeline {
    pub fn new(store: Arc<PgStore>, config: &IngestConfig) -> Self {
        let quarantine = Quarantine::new(&config.data_dir);
        Self {
            loader: BulkLoader::new(
                store,
                RetryPolicy::with_max_attempts(config.max_retries),
                quarantine.clone(),
            ),
            quarantine,
            batch_size: config.batch_size,
        }
    }

    /// Stream one file into its table
    ///
    /// A missing source file is a reported failure; the caller decides
    /// whether to continue with the remaining files. On a framing error
    /// the in-flight buffer is quarantined and the source file stays in
    /// place for a re-run.
    #[instrument(skip(self, validate), fields(table = %table, path = %path.display()))]
    pub async fn process_file(
        &self,
        path: &Path,
        table: SourceTable,
        validate: Option<ValidateFn>,
    ) -> Result<FileReport> {
        if !path.exists() {
            error!(path = %path.display(), "Source file not found");
            return Err(crate::Error::SourceMissing(path.display().to_string()));
        }

        info!(path = %path.display(), "Processing file");

        let mut report = FileReport::new(table);
        let mut stream = JsonArrayStream::new(BufReader::new(File::open(path)?));
        let mut buffer = RowBuffer::new(self.batch_size);
        let mut invalid_records: Vec<serde_json::Value> = Vec::new();

        loop {
            let item = match stream.next_item() {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    // Broken framing: nothing further can be scanned. Park
                    // the in-flight buffer and whatever was already flagged
                    // invalid, and leave the source for a re-run.
                    if !buffer.is_empty() {
                        self.quarantine
                            .save_failed_rows(table.table_name(), buffer.as_str())?;
                    }
                    self.finish_invalid(table, &mut report, &invalid_records)?;
                    return Err(e);
                }
            };

            match item {
                StreamItem::Record(record) => {
                    if let Some(predicate) = validate {
                        if !predicate(&record) {
                            RECORDS_QUARANTINED_TOTAL
                                .with_label_values(&[table.table_name(), "structural"])
                                .inc();
                            invalid_records.push(record.into_value());
                            continue;
                        }
                    }
                    buffer.push(&record.to_copy_row(table.columns()));
                    report.records += 1;

                    if buffer.is_full() {
                        info!(records = report.records, "Flushing full buffer");
                        self.flush(table, &mut buffer, &mut report).await?;
                    }
                }
                StreamItem::Malformed { raw, error } => {
                    RECORDS_QUARANTINED_TOTAL
                        .with_label_values(&[table.table_name(), "malformed"])
                        .inc();
                    invalid_records.push(json!({ "raw": raw, "error": error }));
                }
            }
        }

        // End of stream: flush the remainder even below threshold
        if !buffer.is_empty() {
            self.flush(table, &mut buffer, &mut report).await?;
        }

        self.finish_invalid(table, &mut report, &invalid_records)?;

        if report.is_complete() {
            self.quarantine.archive_source(path)?;
            report.archived = true;
        } else {
            error!(
                failed_batches = report.failed_batches,
                "Load incomplete, source file left in place"
            );
        }

        info!(
            records = report.records,
            loaded = report.loaded,
            invalid = report.invalid,
            failed_batches = report.failed_batches,
            "File processed"
        );
        Ok(report)
    }

    async fn flush(
        &self,
        table: SourceTable,
        buffer: &mut RowBuffer,
        report: &mut FileReport,
    ) -> Result<()> {
        let rows = buffer.take();
        match self.loader.load(table, &rows).await? {
            LoadOutcome::Loaded(copied) => report.loaded += copied,
            LoadOutcome::Quarantined(_) => report.failed_batches += 1,
        }
        Ok(())
    }

    fn finish_invalid(
        &self,
        table: SourceTable,
        report: &mut FileReport,
        invalid_records: &[serde_json::Value],
    ) -> Result<()> {
        report.invalid = invalid_records.len() as u64;
        if !invalid_records.is_empty() {
            self.quarantine
                .save_invalid_records(table.table_name(), invalid_records)?;
        }
        Ok(())
    }
}
