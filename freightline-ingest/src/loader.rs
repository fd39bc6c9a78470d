//! Bulk loader with bounded retry
//!
//! Hands a pending buffer to the storage COPY path. Transient failures are
//! retried up to the policy bound with an explicit attempt counter; once
//! exhausted, the buffer's current content is quarantined as failed-load
//! and the outcome reports the quarantine instead of propagating the error.

use crate::metrics::{BUFFERS_FAILED_TOTAL, BULK_LOAD_RETRIES_TOTAL, RECORDS_LOADED_TOTAL};
use crate::quarantine::Quarantine;
use crate::retry::RetryPolicy;
use crate::Result;
use freightline_core::SourceTable;
use freightline_storage::PgStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What happened to one flushed buffer
#[derive(Debug)]
pub enum LoadOutcome {
    /// Rows committed to the permanent table
    Loaded(u64),

    /// Retries exhausted; the buffer was written to the failed-load
    /// quarantine at this path and nothing was committed
    Quarantined(PathBuf),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }
}

/// Turns validated row buffers into COPY operations with bounded retry
pub struct BulkLoader {
    store: Arc<PgStore>,
    policy: RetryPolicy,
    quarantine: Quarantine,
}

impl BulkLoader {
    pub fn new(store: Arc<PgStore>, policy: RetryPolicy, quarantine: Quarantine) -> Self {
        Self {
            store,
            policy,
            quarantine,
        }
    }

    /// Load one buffer of COPY text rows into a table
    ///
    /// A successful attempt commits that buffer; a failed attempt applies
    /// nothing. Retry exhaustion quarantines the buffer and reports
    /// [`LoadOutcome::Quarantined`] rather than an error, so one bad buffer
    /// never aborts the surrounding file scan.
    #[instrument(skip(self, rows), fields(table = %table, rows = rows.len()))]
    pub async fn load(&self, table: SourceTable, rows: &str) -> Result<LoadOutcome> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self
                .store
                .copy_rows(table.table_name(), table.columns(), rows)
                .await
            {
                Ok(copied) => {
                    RECORDS_LOADED_TOTAL
                        .with_label_values(&[table.table_name()])
                        .inc_by(copied);
                    info!(table = %table, rows = copied, attempt, "Buffer loaded");
                    return Ok(LoadOutcome::Loaded(copied));
                }
                Err(e) if self.policy.should_retry(attempt) => {
                    BULK_LOAD_RETRIES_TOTAL
                        .with_label_values(&[table.table_name()])
                        .inc();
                    warn!(
                        table = %table,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Bulk load failed, retrying"
                    );
                    let delay = self.policy.delay_for(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(
                        table = %table,
                        attempt,
                        error = %e,
                        "Bulk load failed, retries exhausted"
                    );
                    BUFFERS_FAILED_TOTAL
                        .with_label_values(&[table.table_name()])
                        .inc();
                    let path = self.quarantine.save_failed_rows(table.table_name(), rows)?;
                    return Ok(LoadOutcome::Quarantined(path));
                }
            }
        }
    }
}
