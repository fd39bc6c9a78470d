//! Prometheus metrics for ingestion operations

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Total records bulk-loaded into permanent tables
    ///
    /// Labels:
    /// - table: "vehicles", "vehicle_logs", "shipments"
    pub static ref RECORDS_LOADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "freightline_records_loaded_total",
        "Total records bulk-loaded into permanent tables",
        &["table"]
    )
    .expect("freightline_records_loaded_total metric registration");

    /// Total records routed to quarantine
    ///
    /// Labels:
    /// - table: "vehicles", "vehicle_logs", "shipments"
    /// - reason: "malformed", "structural", "referential"
    pub static ref RECORDS_QUARANTINED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "freightline_records_quarantined_total",
        "Total records routed to quarantine",
        &["table", "reason"]
    )
    .expect("freightline_records_quarantined_total metric registration");

    /// Total bulk-load retry attempts
    ///
    /// Labels:
    /// - table: "vehicles", "vehicle_logs", "shipments"
    pub static ref BULK_LOAD_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "freightline_bulk_load_retries_total",
        "Total bulk-load retry attempts",
        &["table"]
    )
    .expect("freightline_bulk_load_retries_total metric registration");

    /// Total buffers quarantined after exhausting load retries
    ///
    /// Labels:
    /// - table: "vehicles", "vehicle_logs", "shipments"
    pub static ref BUFFERS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "freightline_buffers_failed_total",
        "Total buffers quarantined after exhausting load retries",
        &["table"]
    )
    .expect("freightline_buffers_failed_total metric registration");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Ensure all metrics are registered correctly by accessing them
        let _ = RECORDS_LOADED_TOTAL.with_label_values(&["vehicles"]);
        let _ = RECORDS_QUARANTINED_TOTAL.with_label_values(&["shipments", "referential"]);
        let _ = BULK_LOAD_RETRIES_TOTAL.with_label_values(&["vehicle_logs"]);
        let _ = BUFFERS_FAILED_TOTAL.with_label_values(&["shipments"]);
    }
}
