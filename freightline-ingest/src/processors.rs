//! Per-file processors
//!
//! One processor per source file. Vehicles and vehicle logs go through the
//! plain [`StreamPipeline`]; shipments reference trip logs by `log_id` and
//! are validated batch-wise through the staged cross-table path on a
//! dedicated connection, since the staging relation is session-scoped.

use crate::buffer::RowBuffer;
use crate::config::IngestConfig;
use crate::metrics::RECORDS_QUARANTINED_TOTAL;
use crate::pipeline::{FileReport, StreamPipeline};
use crate::quarantine::Quarantine;
use crate::stream::{JsonArrayStream, StreamItem};
use crate::Result;
use freightline_core::{validate_trip_log, SourceTable};
use freightline_storage::staging::{setup_staging, validate_batch};
use freightline_storage::PgStore;
use serde_json::json;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Loads the vehicles reference file
///
/// No per-record predicate; vehicle records are trusted upstream.
pub struct VehicleProcessor {
    pipeline: StreamPipeline,
    path: PathBuf,
}

impl VehicleProcessor {
    pub fn new(store: Arc<PgStore>, config: &IngestConfig) -> Self {
        Self {
            pipeline: StreamPipeline::new(store, config),
            path: config.raw_path(SourceTable::Vehicles),
        }
    }

    pub async fn run(&self) -> Result<FileReport> {
        self.pipeline
            .process_file(&self.path, SourceTable::Vehicles, None)
            .await
    }
}

/// Loads the trip-log file with per-record validation
pub struct VehicleLogProcessor {
    pipeline: StreamPipeline,
    path: PathBuf,
}

impl VehicleLogProcessor {
    pub fn new(store: Arc<PgStore>, config: &IngestConfig) -> Self {
        Self {
            pipeline: StreamPipeline::new(store, config),
            path: config.raw_path(SourceTable::VehicleLogs),
        }
    }

    pub async fn run(&self) -> Result<FileReport> {
        self.pipeline
            .process_file(&self.path, SourceTable::VehicleLogs, Some(validate_trip_log))
            .await
    }
}

/// Loads the shipments file through staged cross-table validation
///
/// Each pending buffer is staged and split against `vehicle_logs` in one
/// transaction; referentially invalid records join the invalid quarantine
/// and a failed batch rolls back, quarantines the raw buffer, and fails
/// the whole file.
pub struct ShipmentProcessor {
    store: Arc<PgStore>,
    quarantine: Quarantine,
    batch_size: usize,
    path: PathBuf,
}

impl ShipmentProcessor {
    pub fn new(store: Arc<PgStore>, config: &IngestConfig) -> Self {
        Self {
            store,
            quarantine: Quarantine::new(&config.data_dir),
            batch_size: config.batch_size,
            path: config.raw_path(SourceTable::Shipments),
        }
    }

    #[instrument(skip(self), fields(table = "shipments", path = %self.path.display()))]
    pub async fn run(&self) -> Result<FileReport> {
        let table = SourceTable::Shipments;

        if !self.path.exists() {
            error!(path = %self.path.display(), "Source file not found");
            return Err(crate::Error::SourceMissing(self.path.display().to_string()));
        }

        info!(path = %self.path.display(), "Processing file");

        // The staging relation is session-scoped, so the whole file runs
        // on one dedicated connection, never shared with other processors.
        let mut conn = self
            .store
            .pool()
            .acquire()
            .await
            .map_err(freightline_storage::Error::from)?;
        setup_staging(&mut conn).await?;

        let mut report = FileReport {
            table,
            records: 0,
            loaded: 0,
            invalid: 0,
            failed_batches: 0,
            archived: false,
        };
        let mut stream = JsonArrayStream::new(BufReader::new(File::open(&self.path)?));
        let mut buffer = RowBuffer::new(self.batch_size);
        let mut invalid_records: Vec<serde_json::Value> = Vec::new();

        loop {
            let item = match stream.next_item() {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    if !buffer.is_empty() {
                        self.quarantine
                            .save_failed_rows(table.table_name(), buffer.as_str())?;
                    }
                    self.save_invalid(&invalid_records)?;
                    return Err(e);
                }
            };

            match item {
                StreamItem::Record(record) => {
                    buffer.push(&record.to_copy_row(table.columns()));
                    report.records += 1;

                    if buffer.is_full() {
                        info!(records = report.records, "Validating full shipment buffer");
                        self.flush_staged(&mut conn, &mut buffer, &mut report, &mut invalid_records)
                            .await?;
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

        if !buffer.is_empty() {
            self.flush_staged(&mut conn, &mut buffer, &mut report, &mut invalid_records)
                .await?;
        }

        report.invalid = invalid_records.len() as u64;
        self.save_invalid(&invalid_records)?;

        self.quarantine.archive_source(&self.path)?;
        report.archived = true;

        info!(
            records = report.records,
            loaded = report.loaded,
            invalid = report.invalid,
            "File processed"
        );
        Ok(report)
    }

    /// Stage one buffer, split it against `vehicle_logs`, commit the valid
    /// subset
    ///
    /// A failed batch has already been rolled back by the staged validator;
    /// the raw buffer is quarantined as failed-load and the error fails
    /// the file, so nothing is partially applied.
    async fn flush_staged(
        &self,
        conn: &mut sqlx::postgres::PgConnection,
        buffer: &mut RowBuffer,
        report: &mut FileReport,
        invalid_records: &mut Vec<serde_json::Value>,
    ) -> Result<()> {
        let table = SourceTable::Shipments;
        let rows = buffer.take();

        match validate_batch(conn, &rows).await {
            Ok(outcome) => {
                report.loaded += outcome.inserted;
                if !outcome.invalid.is_empty() {
                    RECORDS_QUARANTINED_TOTAL
                        .with_label_values(&[table.table_name(), "referential"])
                        .inc_by(outcome.invalid.len() as u64);
                    invalid_records.extend(outcome.invalid);
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Staged batch failed, quarantining buffer");
                report.failed_batches += 1;
                self.quarantine.save_failed_rows(table.table_name(), &rows)?;
                self.save_invalid(invalid_records)?;
                Err(e.into())
            }
        }
    }

    fn save_invalid(&self, invalid_records: &[serde_json::Value]) -> Result<()> {
        if !invalid_records.is_empty() {
            self.quarantine
                .save_invalid_records(SourceTable::Shipments.table_name(), invalid_records)?;
        }
        Ok(())
    }
}
