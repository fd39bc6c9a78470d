//! Row models for the tracking and status tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of `batch_processing_status`
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BatchStatusModel {
    pub batch_id: String,
    pub vehicles_processed: bool,
    pub vehicle_logs_processed: bool,
    pub shipments_processed: bool,
    pub batch_started_at: DateTime<Utc>,
    pub batch_completed_at: Option<DateTime<Utc>>,
}

impl BatchStatusModel {
    /// Whether every per-table flag is set
    pub fn all_complete(&self) -> bool {
        self.vehicles_processed && self.vehicle_logs_processed && self.shipments_processed
    }
}

/// The single `system_status` row
#[derive(Debug, Clone, FromRow)]
pub struct SystemStatusModel {
    pub id: i32,
    pub is_calculating: bool,
    pub started_calculating_at: Option<DateTime<Utc>>,
    pub last_calculated_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Externally consumed view of the calculation status
///
/// Absence of the underlying row reads as "not calculating".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStatusSnapshot {
    pub is_calculating: bool,
    pub last_calculated_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<SystemStatusModel> for SystemStatusSnapshot {
    fn from(row: SystemStatusModel) -> Self {
        Self {
            is_calculating: row.is_calculating,
            last_calculated_at: row.last_calculated_at,
            error_message: row.error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_complete_requires_every_flag() {
        let mut status = BatchStatusModel {
            batch_id: "BATCH_TEST".to_string(),
            vehicles_processed: true,
            vehicle_logs_processed: true,
            shipments_processed: false,
            batch_started_at: Utc::now(),
            batch_completed_at: None,
        };
        assert!(!status.all_complete());

        status.shipments_processed = true;
        assert!(status.all_complete());
    }

    #[test]
    fn test_snapshot_default_is_not_calculating() {
        let snapshot = SystemStatusSnapshot::default();
        assert!(!snapshot.is_calculating);
        assert!(snapshot.last_calculated_at.is_none());
        assert!(snapshot.error_message.is_none());
    }
}
