//! Batch completion tracking
//!
//! Each ingestion run is tracked as one row of `batch_processing_status`
//! with a completion flag per target table. The flag update, the
//! all-complete check, the completion timestamp, and the `pg_notify`
//! emission run in a single transaction, so concurrent processors
//! finishing the last two tables cannot both observe "all complete":
//! exactly one caller stamps the batch and emits the notification.

use crate::models::BatchStatusModel;
use crate::{PgStore, Result};
use freightline_core::{BatchId, SourceTable};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Notification channel carrying completed batch ids
pub const BATCH_COMPLETE_CHANNEL: &str = "ingest_complete";

/// Tracks per-batch, per-table completion and emits the completion event
#[derive(Clone)]
pub struct BatchTracker {
    store: Arc<PgStore>,
}

impl BatchTracker {
    pub fn new(store: Arc<PgStore>) -> Self {
        Self { store }
    }

    /// Allocate a new batch id and persist its started record
    #[instrument(skip(self), fields(db.sql.table = "batch_processing_status"))]
    pub async fn start_batch(&self) -> Result<BatchId> {
        let batch_id = BatchId::generate();

        sqlx::query(
            "INSERT INTO batch_processing_status (batch_id, batch_started_at) \
             VALUES ($1, NOW())",
        )
        .bind(batch_id.as_str())
        .execute(self.store.pool())
        .await?;

        info!(batch_id = %batch_id, "Started new batch");
        Ok(batch_id)
    }

    /// Idempotently mark one table's load complete
    ///
    /// Returns `true` if this call observed the batch become fully complete
    /// and emitted the completion notification. Concurrent callers for the
    /// same batch serialize on the tracking row's lock, and the
    /// `batch_completed_at IS NULL` guard ensures at most one emission.
    #[instrument(
        skip(self),
        fields(
            batch_id = %batch_id,
            table = %table,
            db.sql.table = "batch_processing_status",
        )
    )]
    pub async fn mark_table_complete(&self, batch_id: &BatchId, table: SourceTable) -> Result<bool> {
        let update = format!(
            "UPDATE batch_processing_status SET {} = TRUE WHERE batch_id = $1 \
             RETURNING (vehicles_processed AND vehicle_logs_processed AND shipments_processed), \
                       (batch_completed_at IS NOT NULL)",
            completion_column(table)
        );
        let id = batch_id.as_str().to_string();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let row: Option<(bool, bool)> = sqlx::query_as(&update)
                        .bind(&id)
                        .fetch_optional(&mut **tx)
                        .await?;

                    let (all_complete, already_completed) = row.ok_or_else(|| {
                        crate::Error::NotFound(format!("Batch {}", id))
                    })?;

                    if !all_complete || already_completed {
                        debug!(all_complete, already_completed, "Table marked complete");
                        return Ok(false);
                    }

                    // Only the caller that wins this guarded update notifies
                    let stamped = sqlx::query(
                        "UPDATE batch_processing_status SET batch_completed_at = NOW() \
                         WHERE batch_id = $1 AND batch_completed_at IS NULL",
                    )
                    .bind(&id)
                    .execute(&mut **tx)
                    .await?
                    .rows_affected();

                    if stamped == 0 {
                        return Ok(false);
                    }

                    sqlx::query("SELECT pg_notify($1, $2)")
                        .bind(BATCH_COMPLETE_CHANNEL)
                        .bind(&id)
                        .execute(&mut **tx)
                        .await?;

                    info!(batch_id = %id, "Batch complete, notification sent");
                    Ok(true)
                })
            })
            .await
    }

    /// Read-only snapshot of a batch's flags and timestamps
    ///
    /// Returns `Ok(None)` for an unknown batch id.
    #[instrument(skip(self), fields(batch_id = %batch_id))]
    pub async fn get_batch_status(&self, batch_id: &BatchId) -> Result<Option<BatchStatusModel>> {
        let status = sqlx::query_as::<_, BatchStatusModel>(
            r#"
            SELECT batch_id,
                   vehicles_processed,
                   vehicle_logs_processed,
                   shipments_processed,
                   batch_started_at,
                   batch_completed_at
            FROM batch_processing_status
            WHERE batch_id = $1
            "#,
        )
        .bind(batch_id.as_str())
        .fetch_optional(self.store.pool())
        .await?;

        Ok(status)
    }
}

/// Tracking column set by a table's processor on success
fn completion_column(table: SourceTable) -> &'static str {
    match table {
        SourceTable::Vehicles => "vehicles_processed",
        SourceTable::VehicleLogs => "vehicle_logs_processed",
        SourceTable::Shipments => "shipments_processed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_columns_match_table_names() {
        for table in SourceTable::ALL {
            let column = completion_column(table);
            assert_eq!(column, format!("{}_processed", table.table_name()));
        }
    }
}
