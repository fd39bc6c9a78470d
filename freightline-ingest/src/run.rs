//! Batch run driver
//!
//! Drives the three file processors for one batch: start the batch, run
//! each processor, mark its table complete on success, and log the final
//! tracker snapshot. A failed file is reported and the run continues with
//! the remaining files; completion marking is what eventually fires the
//! downstream notification once all three tables are in.

use crate::config::IngestConfig;
use crate::pipeline::FileReport;
use crate::processors::{ShipmentProcessor, VehicleLogProcessor, VehicleProcessor};
use crate::Result;
use freightline_core::{BatchId, SourceTable};
use freightline_storage::{BatchStatusModel, BatchTracker, PgStore, SchemaManager};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Result of one processor within a run
#[derive(Debug)]
pub struct FileOutcome {
    pub table: SourceTable,
    pub result: Result<FileReport>,
    /// Whether the table was marked complete in the tracker
    pub marked_complete: bool,
}

/// Summary of one end-to-end ingestion run
#[derive(Debug)]
pub struct RunSummary {
    pub batch_id: BatchId,
    pub outcomes: Vec<FileOutcome>,
    pub status: Option<BatchStatusModel>,
}

impl RunSummary {
    /// Whether every table loaded fully and was marked complete
    pub fn all_complete(&self) -> bool {
        self.status.as_ref().is_some_and(BatchStatusModel::all_complete)
    }
}

/// Runs one batch across all three source files
pub struct IngestRunner {
    store: Arc<PgStore>,
    tracker: BatchTracker,
    config: IngestConfig,
}

impl IngestRunner {
    pub fn new(store: Arc<PgStore>, config: IngestConfig) -> Self {
        Self {
            tracker: BatchTracker::new(store.clone()),
            store,
            config,
        }
    }

    /// Execute one full ingestion batch
    ///
    /// Ensures the schema, starts a batch, and processes the files in
    /// reference-before-dependent order. Tracker failures are fatal;
    /// per-file failures are not.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RunSummary> {
        SchemaManager::new(self.store.clone()).ensure_all().await?;

        let batch_id = self.tracker.start_batch().await?;
        let mut outcomes = Vec::with_capacity(SourceTable::ALL.len());

        let vehicles = VehicleProcessor::new(self.store.clone(), &self.config);
        outcomes.push(
            self.settle(&batch_id, SourceTable::Vehicles, vehicles.run().await)
                .await?,
        );

        let logs = VehicleLogProcessor::new(self.store.clone(), &self.config);
        outcomes.push(
            self.settle(&batch_id, SourceTable::VehicleLogs, logs.run().await)
                .await?,
        );

        let shipments = ShipmentProcessor::new(self.store.clone(), &self.config);
        outcomes.push(
            self.settle(&batch_id, SourceTable::Shipments, shipments.run().await)
                .await?,
        );

        let status = self.tracker.get_batch_status(&batch_id).await?;
        match &status {
            Some(status) if status.all_complete() => {
                info!(batch_id = %batch_id, "Batch processing completed")
            }
            Some(status) => warn!(
                batch_id = %batch_id,
                vehicles = status.vehicles_processed,
                vehicle_logs = status.vehicle_logs_processed,
                shipments = status.shipments_processed,
                "Batch finished with incomplete tables"
            ),
            None => error!(batch_id = %batch_id, "Batch status row missing after run"),
        }

        Ok(RunSummary {
            batch_id,
            outcomes,
            status,
        })
    }

    /// Record a processor's outcome, marking its table complete on success
    async fn settle(
        &self,
        batch_id: &BatchId,
        table: SourceTable,
        result: Result<FileReport>,
    ) -> Result<FileOutcome> {
        let marked_complete = match &result {
            Ok(report) if report.is_complete() => {
                self.tracker.mark_table_complete(batch_id, table).await?;
                true
            }
            Ok(report) => {
                warn!(
                    table = %table,
                    failed_batches = report.failed_batches,
                    "Load incomplete, table not marked complete"
                );
                false
            }
            Err(e) => {
                error!(
                    table = %table,
                    error = %e,
                    "File processing failed, continuing with remaining files"
                );
                false
            }
        };

        Ok(FileOutcome {
            table,
            result,
            marked_complete,
        })
    }
}
