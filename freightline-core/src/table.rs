//! Source tables and their bulk-load column layouts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Null sentinel used in COPY text rows
pub const NULL_SENTINEL: &str = "\\N";

/// Column order for the vehicles table
pub const VEHICLE_COLUMNS: &[&str] = &["vehicle_id", "name", "total_mileage"];

/// Column order for the vehicle_logs table
pub const VEHICLE_LOG_COLUMNS: &[&str] =
    &["log_id", "vehicle_id", "trip_date", "mileage", "fuel_used"];

/// Column order for the shipments table (trip_date is added during
/// cross-table validation, not present in the source file)
pub const SHIPMENT_COLUMNS: &[&str] = &[
    "shipment_id",
    "origin",
    "destination",
    "weight",
    "cost",
    "delivery_time",
    "log_id",
];

/// One of the three ingestion target tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTable {
    /// Reference entities
    Vehicles,

    /// Trip logs, referencing vehicles
    VehicleLogs,

    /// Transactional records, referencing vehicle logs
    Shipments,
}

impl SourceTable {
    /// All target tables, in ingestion order (references before dependents)
    pub const ALL: [SourceTable; 3] = [
        SourceTable::Vehicles,
        SourceTable::VehicleLogs,
        SourceTable::Shipments,
    ];

    /// Permanent table name in the database
    pub fn table_name(self) -> &'static str {
        match self {
            SourceTable::Vehicles => "vehicles",
            SourceTable::VehicleLogs => "vehicle_logs",
            SourceTable::Shipments => "shipments",
        }
    }

    /// Column order used for both source records and COPY
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            SourceTable::Vehicles => VEHICLE_COLUMNS,
            SourceTable::VehicleLogs => VEHICLE_LOG_COLUMNS,
            SourceTable::Shipments => SHIPMENT_COLUMNS,
        }
    }

    /// Base name of the source file for this table
    pub fn source_file(self) -> &'static str {
        match self {
            SourceTable::Vehicles => "vehicles.json",
            SourceTable::VehicleLogs => "vehicle_logs.json",
            SourceTable::Shipments => "shipments.json",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl std::convert::TryFrom<&str> for SourceTable {
    type Error = crate::Error;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "vehicles" => Ok(SourceTable::Vehicles),
            "vehicle_logs" => Ok(SourceTable::VehicleLogs),
            "shipments" => Ok(SourceTable::Shipments),
            _ => Err(crate::Error::UnknownTable(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_round_trip() {
        for table in SourceTable::ALL {
            let recovered: SourceTable = table
                .table_name()
                .try_into()
                .expect("Table name should convert back");
            assert_eq!(table, recovered);
        }
    }

    #[test]
    fn test_unknown_table_returns_error() {
        let result: std::result::Result<SourceTable, _> = "warehouses".try_into();
        assert!(matches!(result, Err(crate::Error::UnknownTable(_))));
    }

    #[test]
    fn test_column_layouts() {
        assert_eq!(SourceTable::Vehicles.columns().len(), 3);
        assert_eq!(SourceTable::VehicleLogs.columns().len(), 5);
        assert_eq!(SourceTable::Shipments.columns().len(), 7);
        // Join key of the dependent path is the last shipment column
        assert_eq!(SourceTable::Shipments.columns()[6], "log_id");
    }
}
