//! Index maintenance
//!
//! All indexes are created with `IF NOT EXISTS`, so maintenance after every
//! batch is a no-op once they exist. The partitioned tables get their
//! indexes per yearly partition over the same year range the schema
//! manager partitions with.

use crate::Result;
use freightline_storage::schema::default_partition_years;
use freightline_storage::PgStore;
use std::ops::Range;
use std::sync::Arc;
use tracing::{info, instrument};

/// Indexes on the parent tables
const INDEXES: &[(&str, &str)] = &[
    (
        "shipments_log_id",
        "CREATE INDEX IF NOT EXISTS idx_shipments_log_id ON shipments (log_id)",
    ),
    (
        "shipment_routes",
        "CREATE INDEX IF NOT EXISTS idx_shipment_routes ON shipments (origin, destination)",
    ),
    (
        "shipments_cost_weight",
        "CREATE INDEX IF NOT EXISTS idx_shipments_cost_weight ON shipments (cost, weight)",
    ),
];

/// Column sets indexed on every yearly partition
const PARTITION_INDEXES: &[(&str, &str, &[&str])] = &[
    ("log_cost", "shipments", &["log_id", "cost", "delivery_time"]),
    ("routes", "shipments", &["origin", "destination"]),
    ("cost_weight", "shipments", &["cost", "weight"]),
    ("composite", "vehicle_logs", &["trip_date", "vehicle_id", "log_id"]),
    ("date", "vehicle_logs", &["trip_date"]),
];

/// Generate per-partition index DDL for one column set
fn partition_indexes(suffix: &str, table: &str, columns: &[&str], years: Range<i32>) -> Vec<String> {
    years
        .map(|year| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{year}_{suffix} \
                 ON {table}_{year} ({columns})",
                table = table,
                year = year,
                suffix = suffix,
                columns = columns.join(", "),
            )
        })
        .collect()
}

/// Creates the query-path indexes after each batch
pub struct IndexManager {
    store: Arc<PgStore>,
    partition_years: Range<i32>,
}

impl IndexManager {
    pub fn new(store: Arc<PgStore>) -> Self {
        Self::with_partition_years(store, default_partition_years())
    }

    pub fn with_partition_years(store: Arc<PgStore>, partition_years: Range<i32>) -> Self {
        Self {
            store,
            partition_years,
        }
    }

    /// Create every index, in one transaction
    #[instrument(skip(self), fields(db.system = "postgresql", db.operation = "DDL"))]
    pub async fn create_indexes(&self) -> Result<()> {
        let mut statements: Vec<String> =
            INDEXES.iter().map(|(_, sql)| sql.to_string()).collect();
        for (suffix, table, columns) in PARTITION_INDEXES {
            statements.extend(partition_indexes(
                suffix,
                table,
                columns,
                self.partition_years.clone(),
            ));
        }

        info!(count = statements.len(), "Creating indexes");
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    for sql in &statements {
                        sqlx::query(sql).execute(&mut **tx).await?;
                    }
                    Ok(())
                })
            })
            .await?;

        info!("Indexes created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_index_ddl_covers_the_year_range() {
        let ddl = partition_indexes("date", "vehicle_logs", &["trip_date"], 2020..2022);
        assert_eq!(ddl.len(), 2);
        assert_eq!(
            ddl[0],
            "CREATE INDEX IF NOT EXISTS idx_vehicle_logs_2020_date \
             ON vehicle_logs_2020 (trip_date)"
        );
        assert_eq!(
            ddl[1],
            "CREATE INDEX IF NOT EXISTS idx_vehicle_logs_2021_date \
             ON vehicle_logs_2021 (trip_date)"
        );
    }

    #[test]
    fn test_partition_index_names_are_distinct_per_column_set() {
        let mut names: Vec<String> = Vec::new();
        for (suffix, table, columns) in PARTITION_INDEXES {
            for ddl in partition_indexes(suffix, table, columns, 2020..2021) {
                let name = ddl
                    .split_whitespace()
                    .nth(5)
                    .expect("DDL should carry an index name")
                    .to_string();
                assert!(!names.contains(&name), "Duplicate index name: {name}");
                names.push(name);
            }
        }
    }
}
