//! Staged cross-table validation for shipment batches
//!
//! Shipments reference trip logs by `log_id`. Checking each record against
//! a large `vehicle_logs` table row-by-row is prohibitively slow, so each
//! pending buffer is COPYed into a session-scoped staging table and split
//! valid/invalid with one set-based join. The staging table is `TEMP ... ON
//! COMMIT DELETE ROWS` and is truncated at the start of every batch, so no
//! rows survive between batches.
//!
//! A reference row dated after `CURRENT_DATE` does not satisfy the match:
//! a shipment cannot reference a trip that has not happened yet. Such
//! shipments are returned as invalid, not inserted.

use crate::copy::copy_rows_on;
use crate::Result;
use sqlx::postgres::{PgConnection, Postgres};
use sqlx::{Connection, Transaction};
use tracing::{debug, instrument, warn};

/// Staging table column layout, matching the shipment source columns
const STAGING_COLUMNS: &[&str] = &[
    "shipment_id",
    "origin",
    "destination",
    "weight",
    "cost",
    "delivery_time",
    "log_id",
];

/// Result of validating one staged batch
#[derive(Debug)]
pub struct StagedBatchOutcome {
    /// Rows inserted into the permanent table
    pub inserted: u64,
    /// Rows with no usable trip-log reference, as JSON records
    pub invalid: Vec<serde_json::Value>,
}

/// Create the staging relation for this session
///
/// Safe to call repeatedly; rows are cleared at every transaction end.
pub async fn setup_staging(conn: &mut PgConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TEMP TABLE IF NOT EXISTS staging_shipments (
            shipment_id VARCHAR(20),
            origin VARCHAR(100),
            destination VARCHAR(100),
            weight DECIMAL(10,2),
            cost DECIMAL(10,2),
            delivery_time INTEGER,
            log_id VARCHAR(20)
        ) ON COMMIT DELETE ROWS
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_staging_shipments_log_id \
         ON staging_shipments (log_id)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Validate one pending buffer of shipment rows and commit the valid subset
///
/// Runs entirely in one transaction: stage, split, insert enriched rows,
/// commit. Any failure rolls the whole batch back and nothing is applied;
/// the caller owns quarantining the raw buffer in that case.
#[instrument(skip(conn, rows), fields(db.system = "postgresql", db.sql.table = "shipments"))]
pub async fn validate_batch(conn: &mut PgConnection, rows: &str) -> Result<StagedBatchOutcome> {
    let mut tx = conn.begin().await?;

    let outcome = match stage_and_split(&mut tx, rows).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed batch also failed");
            }
            return Err(e);
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

async fn stage_and_split(
    tx: &mut Transaction<'_, Postgres>,
    rows: &str,
) -> Result<StagedBatchOutcome> {
    // Never let rows from a previous batch leak into this validation
    sqlx::query("TRUNCATE staging_shipments")
        .execute(&mut **tx)
        .await?;

    let staged = copy_rows_on(&mut **tx, "staging_shipments", STAGING_COLUMNS, rows).await?;
    debug!(rows = staged, "Batch staged for validation");

    // Rows whose log_id has no trip log dated today or earlier
    let invalid_json: serde_json::Value = sqlx::query_scalar(
        r#"
        WITH matchable_logs AS (
            SELECT DISTINCT log_id
            FROM vehicle_logs
            WHERE trip_date <= CURRENT_DATE
        ),
        invalid_records AS (
            SELECT t.*
            FROM staging_shipments t
            LEFT JOIN matchable_logs m ON t.log_id = m.log_id
            WHERE m.log_id IS NULL
        )
        SELECT COALESCE(array_to_json(array_agg(row_to_json(r))), '[]'::json)
        FROM invalid_records r
        "#,
    )
    .fetch_one(&mut **tx)
    .await?;

    let invalid = match invalid_json {
        serde_json::Value::Array(records) => records,
        other => {
            return Err(crate::Error::Internal(format!(
                "Unexpected invalid-record payload: {}",
                other
            )))
        }
    };

    // Insert the valid subset, denormalizing the matched trip date onto
    // each row for partition pruning downstream
    let inserted = sqlx::query(
        r#"
        INSERT INTO shipments
            (shipment_id, origin, destination, weight, cost, delivery_time, log_id, trip_date)
        SELECT t.shipment_id, t.origin, t.destination, t.weight, t.cost,
               t.delivery_time, t.log_id, v.trip_date
        FROM staging_shipments t
        JOIN vehicle_logs v
          ON t.log_id = v.log_id
         AND v.trip_date <= CURRENT_DATE
        "#,
    )
    .execute(&mut **tx)
    .await?
    .rows_affected();

    debug!(
        inserted,
        invalid = invalid.len(),
        "Staged batch split complete"
    );

    Ok(StagedBatchOutcome { inserted, invalid })
}
