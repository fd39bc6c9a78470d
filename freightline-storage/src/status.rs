//! Calculation-status flag
//!
//! External consumers poll this flag to avoid reading aggregates while a
//! rebuild is in flight. The pipeline is its sole writer. The table holds
//! at most one row (fixed id), and readers treat absence as "not
//! calculating".

use crate::models::{SystemStatusModel, SystemStatusSnapshot};
use crate::{PgStore, Result};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Reads and writes the single `system_status` row
#[derive(Clone)]
pub struct CalculationStatusTracker {
    store: Arc<PgStore>,
}

impl CalculationStatusTracker {
    pub fn new(store: Arc<PgStore>) -> Self {
        Self { store }
    }

    /// Current status; a missing row reads as not calculating
    #[instrument(skip(self), fields(db.sql.table = "system_status"))]
    pub async fn get_system_status(&self) -> Result<SystemStatusSnapshot> {
        let row = sqlx::query_as::<_, SystemStatusModel>(
            "SELECT id, is_calculating, started_calculating_at, last_calculated_at, error_message \
             FROM system_status LIMIT 1",
        )
        .fetch_optional(self.store.pool())
        .await?;

        Ok(row.map(SystemStatusSnapshot::from).unwrap_or_default())
    }

    /// Flag the start of a rebuild, creating the status row if absent
    #[instrument(skip(self), fields(db.sql.table = "system_status"))]
    pub async fn mark_calculation_start(&self) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_status (id, is_calculating, started_calculating_at, error_message)
            VALUES (1, TRUE, NOW(), NULL)
            ON CONFLICT (id) DO UPDATE
                SET is_calculating = TRUE,
                    started_calculating_at = NOW(),
                    error_message = NULL
            "#,
        )
        .execute(self.store.pool())
        .await?;

        debug!("Calculation flagged in progress");
        Ok(())
    }

    /// Flag the end of a rebuild, stamping completion time
    ///
    /// On failure the error message is recorded; the in-progress flag is
    /// cleared either way.
    #[instrument(skip(self, error), fields(db.sql.table = "system_status", success))]
    pub async fn mark_calculation_end(&self, success: bool, error: Option<&str>) -> Result<()> {
        let message = if success { None } else { error };

        sqlx::query(
            r#"
            INSERT INTO system_status (id, is_calculating, last_calculated_at, error_message)
            VALUES (1, FALSE, NOW(), $1)
            ON CONFLICT (id) DO UPDATE
                SET is_calculating = FALSE,
                    last_calculated_at = NOW(),
                    error_message = $1
            "#,
        )
        .bind(message)
        .execute(self.store.pool())
        .await?;

        debug!(success, "Calculation flagged complete");
        Ok(())
    }
}
