//! Downstream refresh orchestrator
//!
//! Invoked by the completion listener once per completed batch: flag the
//! rebuild in the calculation status, run index maintenance, refresh the
//! aggregate views, clear the flag. External API consumers poll the flag
//! to avoid reading aggregates mid-rebuild, so it is cleared on every exit
//! path; a refresh error is recorded in the flag's error message, never
//! left as a stuck "calculating".

use crate::indexes::IndexManager;
use crate::views::{ViewDef, ViewManager};
use crate::Result;
use freightline_core::BatchId;
use freightline_storage::{CalculationStatusTracker, PgStore};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Runs post-ingest index and view maintenance behind the status flag
pub struct RefreshOrchestrator {
    status: CalculationStatusTracker,
    indexes: IndexManager,
    views: ViewManager,
}

impl RefreshOrchestrator {
    pub fn new(store: Arc<PgStore>) -> Self {
        Self {
            status: CalculationStatusTracker::new(store.clone()),
            indexes: IndexManager::new(store.clone()),
            views: ViewManager::new(store),
        }
    }

    /// Orchestrator over an explicit view list
    pub fn with_views(store: Arc<PgStore>, views: Vec<ViewDef>) -> Self {
        Self {
            status: CalculationStatusTracker::new(store.clone()),
            indexes: IndexManager::new(store.clone()),
            views: ViewManager::with_views(store, views),
        }
    }

    /// Run the full refresh for one completed batch
    ///
    /// The status flag is set before any maintenance starts and cleared
    /// whether or not the rebuild succeeds; on failure the error message
    /// is recorded for external readers and the error is returned to the
    /// caller (the listener logs it and keeps running).
    #[instrument(skip(self), fields(batch_id = %batch_id))]
    pub async fn process_completed_batch(&self, batch_id: &BatchId) -> Result<()> {
        info!(batch_id = %batch_id, "Starting post-ingest processing");
        self.status.mark_calculation_start().await?;

        let outcome = self.rebuild().await;
        match &outcome {
            Ok(()) => {
                self.status.mark_calculation_end(true, None).await?;
                info!(batch_id = %batch_id, "Completed post-ingest processing");
            }
            Err(e) => {
                error!(batch_id = %batch_id, error = %e, "Post-ingest processing failed");
                self.status
                    .mark_calculation_end(false, Some(&e.to_string()))
                    .await?;
            }
        }
        outcome
    }

    async fn rebuild(&self) -> Result<()> {
        self.indexes.create_indexes().await?;
        self.views.refresh_all().await?;
        Ok(())
    }
}
