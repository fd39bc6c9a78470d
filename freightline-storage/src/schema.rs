//! Schema management
//!
//! Base tables are created at run start with `CREATE TABLE IF NOT EXISTS`;
//! the two date-keyed tables are range-partitioned by `trip_date` with one
//! partition per year over a configurable range.

use crate::{PgStore, Result};
use chrono::Datelike;
use std::ops::Range;
use std::sync::Arc;
use tracing::{info, instrument};

/// First partitioned year in the default range
pub const FIRST_PARTITION_YEAR: i32 = 2020;

/// Default partition year range (end exclusive): from the first data year
/// through next year, so future-dated reference rows still land in a
/// partition.
pub fn default_partition_years() -> Range<i32> {
    FIRST_PARTITION_YEAR..(chrono::Utc::now().year() + 2)
}

/// Creates and maintains the permanent, tracking, and status tables
pub struct SchemaManager {
    store: Arc<PgStore>,
    partition_years: Range<i32>,
}

impl SchemaManager {
    pub fn new(store: Arc<PgStore>) -> Self {
        Self::with_partition_years(store, default_partition_years())
    }

    pub fn with_partition_years(store: Arc<PgStore>, partition_years: Range<i32>) -> Self {
        Self {
            store,
            partition_years,
        }
    }

    /// Ensure every table the pipeline touches exists
    #[instrument(skip(self), fields(db.system = "postgresql", db.operation = "DDL"))]
    pub async fn ensure_all(&self) -> Result<()> {
        self.create_vehicles().await?;
        self.create_vehicle_logs().await?;
        self.create_shipments().await?;
        self.create_tracking_table().await?;
        self.create_status_table().await?;
        info!("Schema ensured");
        Ok(())
    }

    async fn execute(&self, ddl: &str) -> Result<()> {
        sqlx::query(ddl)
            .execute(self.store.pool())
            .await
            .map_err(|e| crate::Error::Schema(format!("{}: {}", first_line(ddl), e)))?;
        Ok(())
    }

    async fn create_vehicles(&self) -> Result<()> {
        self.execute(
            r#"
            CREATE TABLE IF NOT EXISTS vehicles (
                vehicle_id VARCHAR(10) PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                total_mileage FLOAT NOT NULL CHECK (total_mileage >= 0)
            )
            "#,
        )
        .await
    }

    async fn create_vehicle_logs(&self) -> Result<()> {
        self.execute(
            r#"
            CREATE TABLE IF NOT EXISTS vehicle_logs (
                log_id VARCHAR(10) NOT NULL,
                vehicle_id VARCHAR(10) REFERENCES vehicles(vehicle_id),
                trip_date DATE NOT NULL,
                mileage FLOAT NOT NULL CHECK (mileage >= 0),
                fuel_used FLOAT NOT NULL CHECK (fuel_used >= 0),
                PRIMARY KEY (log_id, trip_date)
            ) PARTITION BY RANGE (trip_date)
            "#,
        )
        .await?;
        self.create_year_partitions("vehicle_logs").await
    }

    async fn create_shipments(&self) -> Result<()> {
        self.execute(
            r#"
            CREATE TABLE IF NOT EXISTS shipments (
                shipment_id VARCHAR(10) NOT NULL,
                origin VARCHAR(100) NOT NULL,
                destination VARCHAR(100) NOT NULL,
                weight FLOAT NOT NULL CHECK (weight > 0),
                cost FLOAT NOT NULL CHECK (cost > 0),
                delivery_time INTEGER NOT NULL CHECK (delivery_time > 0),
                log_id VARCHAR(10) NOT NULL,
                trip_date DATE NOT NULL,
                PRIMARY KEY (shipment_id, trip_date)
            ) PARTITION BY RANGE (trip_date)
            "#,
        )
        .await?;
        self.create_year_partitions("shipments").await
    }

    async fn create_year_partitions(&self, table: &str) -> Result<()> {
        for year in self.partition_years.clone() {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {table}_{year} PARTITION OF {table} \
                 FOR VALUES FROM ('{year}-01-01') TO ('{next}-01-01')",
                table = table,
                year = year,
                next = year + 1,
            );
            self.execute(&ddl).await?;
        }
        Ok(())
    }

    async fn create_tracking_table(&self) -> Result<()> {
        self.execute(
            r#"
            CREATE TABLE IF NOT EXISTS batch_processing_status (
                batch_id VARCHAR(50) PRIMARY KEY,
                vehicles_processed BOOLEAN NOT NULL DEFAULT FALSE,
                vehicle_logs_processed BOOLEAN NOT NULL DEFAULT FALSE,
                shipments_processed BOOLEAN NOT NULL DEFAULT FALSE,
                batch_started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                batch_completed_at TIMESTAMPTZ
            )
            "#,
        )
        .await
    }

    async fn create_status_table(&self) -> Result<()> {
        // Single-row invariant enforced by the CHECK on the fixed id
        self.execute(
            r#"
            CREATE TABLE IF NOT EXISTS system_status (
                id INTEGER PRIMARY KEY DEFAULT 1 CHECK (id = 1),
                is_calculating BOOLEAN NOT NULL DEFAULT FALSE,
                started_calculating_at TIMESTAMPTZ,
                last_calculated_at TIMESTAMPTZ,
                error_message TEXT
            )
            "#,
        )
        .await
    }
}

fn first_line(sql: &str) -> &str {
    sql.trim().lines().next().unwrap_or_default()
}
