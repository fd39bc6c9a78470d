//! Per-record validation predicates
//!
//! These run during streaming, before a record ever reaches the database.
//! They are stateless: cross-table rules (shipment → trip log references)
//! are handled set-wise by the staged validator in the storage layer.

use crate::record::SourceRecord;

/// Stateless predicate applied to each streamed record
pub type ValidateFn = fn(&SourceRecord) -> bool;

/// Validate a trip-log record: both ids present and non-empty, a parseable
/// trip date, and non-negative mileage and fuel figures.
pub fn validate_trip_log(record: &SourceRecord) -> bool {
    let ids_ok = non_empty(record, "log_id") && non_empty(record, "vehicle_id");
    let date_ok = record.date_field("trip_date").is_some();
    let mileage_ok = record.f64_field("mileage").is_some_and(|v| v >= 0.0);
    let fuel_ok = record.f64_field("fuel_used").is_some_and(|v| v >= 0.0);

    ids_ok && date_ok && mileage_ok && fuel_ok
}

fn non_empty(record: &SourceRecord, field: &str) -> bool {
    record
        .str_field(field)
        .is_some_and(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(value: serde_json::Value) -> SourceRecord {
        SourceRecord::from_value(value).expect("Test value should be an object")
    }

    fn valid_log() -> serde_json::Value {
        json!({
            "log_id": "L001",
            "vehicle_id": "V001",
            "trip_date": "2024-03-15",
            "mileage": 320.5,
            "fuel_used": 41.2
        })
    }

    #[test]
    fn test_valid_log_passes() {
        assert!(validate_trip_log(&log(valid_log())));
    }

    #[test]
    fn test_negative_mileage_rejected() {
        let mut v = valid_log();
        v["mileage"] = json!(-1.0);
        assert!(!validate_trip_log(&log(v)));
    }

    #[test]
    fn test_negative_fuel_rejected() {
        let mut v = valid_log();
        v["fuel_used"] = json!(-0.1);
        assert!(!validate_trip_log(&log(v)));
    }

    #[test]
    fn test_blank_log_id_rejected() {
        let mut v = valid_log();
        v["log_id"] = json!("   ");
        assert!(!validate_trip_log(&log(v)));
    }

    #[test]
    fn test_missing_vehicle_id_rejected() {
        let mut v = valid_log();
        v.as_object_mut().unwrap().remove("vehicle_id");
        assert!(!validate_trip_log(&log(v)));
    }

    #[test]
    fn test_unparseable_date_rejected() {
        let mut v = valid_log();
        v["trip_date"] = json!("15/03/2024");
        assert!(!validate_trip_log(&log(v)));
    }

    #[test]
    fn test_zero_values_accepted() {
        let mut v = valid_log();
        v["mileage"] = json!(0.0);
        v["fuel_used"] = json!(0);
        assert!(validate_trip_log(&log(v)));
    }
}
