//! Materialized aggregate views
//!
//! Views are listed in dependency order: `mv_daily_trends` reads
//! `mv_daily_metrics` and must be created and refreshed after it. Each view
//! is created `IF NOT EXISTS` and then refreshed, so the first run builds
//! and later runs rebuild. A view refreshes `CONCURRENTLY` only when it
//! carries a unique index, as PostgreSQL requires.
//!
//! Ratio columns keep their zero-denominator handling inside the database
//! (`CASE WHEN ... = 0 THEN 0`, `NULLIF`), so a zero denominator reads as
//! zero at the consumer boundary.

use crate::Result;
use freightline_storage::PgStore;
use std::sync::Arc;
use tracing::{info, instrument};

/// Definition of one materialized view
#[derive(Debug, Clone)]
pub struct ViewDef {
    pub name: String,
    pub query: String,
    /// Plain indexes as (name, column expression) pairs
    pub indexes: Vec<(String, String)>,
    /// Unique index enabling concurrent refresh
    pub unique_index: Option<(String, String)>,
}

impl ViewDef {
    fn new(name: &str, query: &str) -> Self {
        Self {
            name: name.to_string(),
            query: query.to_string(),
            indexes: Vec::new(),
            unique_index: None,
        }
    }

    fn index(mut self, name: &str, columns: &str) -> Self {
        self.indexes.push((name.to_string(), columns.to_string()));
        self
    }

    fn unique(mut self, name: &str, columns: &str) -> Self {
        self.unique_index = Some((name.to_string(), columns.to_string()));
        self
    }
}

/// The aggregate views, in creation/refresh dependency order
pub fn default_views() -> Vec<ViewDef> {
    vec![
        ViewDef::new(
            "mv_daily_metrics",
            r#"
            SELECT
                DATE(vl.trip_date) AS metric_date,
                COUNT(DISTINCT s.shipment_id) AS total_shipments,
                COUNT(DISTINCT vl.vehicle_id) AS active_vehicles,
                SUM(s.cost) AS total_revenue,
                AVG(s.delivery_time) AS avg_delivery_time
            FROM vehicle_logs vl
            JOIN shipments s ON vl.log_id = s.log_id AND vl.trip_date = s.trip_date
            WHERE vl.mileage IS NOT NULL
                AND vl.fuel_used IS NOT NULL
            GROUP BY DATE(vl.trip_date)
            "#,
        )
        .unique("idx_mv_daily_metrics_date", "metric_date"),
        // Derived from mv_daily_metrics; must come after it
        ViewDef::new(
            "mv_daily_trends",
            r#"
            SELECT
                m1.metric_date,
                m1.total_shipments,
                m1.active_vehicles,
                m1.total_revenue,
                m1.avg_delivery_time,
                CAST(
                    CASE
                        WHEN m2.total_shipments = 0 THEN 0
                        ELSE ((m1.total_shipments - m2.total_shipments)::DECIMAL * 100 / m2.total_shipments)
                    END AS DECIMAL(10,1)
                ) AS shipment_trend,
                CAST(
                    CASE
                        WHEN m2.active_vehicles = 0 THEN 0
                        ELSE ((m1.active_vehicles - m2.active_vehicles)::DECIMAL * 100 / m2.active_vehicles)
                    END AS DECIMAL(10,1)
                ) AS vehicle_trend,
                CAST(
                    CASE
                        WHEN m2.total_revenue = 0 THEN 0
                        ELSE ((m1.total_revenue - m2.total_revenue) * 100 / m2.total_revenue)
                    END AS DECIMAL(10,1)
                ) AS revenue_trend,
                CAST(
                    CASE
                        WHEN m2.avg_delivery_time = 0 THEN 0
                        ELSE ((m1.avg_delivery_time - m2.avg_delivery_time) * 100 / m2.avg_delivery_time)
                    END AS DECIMAL(10,1)
                ) AS delivery_time_trend
            FROM mv_daily_metrics m1
            LEFT JOIN mv_daily_metrics m2 ON m2.metric_date = m1.metric_date - INTERVAL '1 day'
            "#,
        )
        .unique("idx_mv_daily_trends_date", "metric_date"),
        ViewDef::new(
            "mv_route_metrics",
            r#"
            SELECT
                DATE(vl.trip_date) AS metric_date,
                s.origin,
                s.destination,
                vl.vehicle_id,
                COUNT(*) AS shipment_count,
                SUM(s.cost) AS total_cost,
                AVG(s.cost) AS avg_cost,
                SUM(s.weight) AS total_weight,
                SUM(vl.mileage) AS total_mileage
            FROM shipments s
            JOIN vehicle_logs vl ON s.log_id = vl.log_id AND s.trip_date = vl.trip_date
            GROUP BY DATE(vl.trip_date), s.origin, s.destination, vl.vehicle_id
            "#,
        )
        .index("idx_mv_route_metrics_date", "metric_date")
        .index("idx_mv_route_metrics_cost", "total_cost DESC"),
        ViewDef::new(
            "mv_daily_shipment_totals",
            r#"
            SELECT
                DATE(vl.trip_date) AS metric_date,
                COUNT(DISTINCT s.shipment_id) AS total_shipments,
                CAST(AVG(s.delivery_time) AS DECIMAL(10,2)) AS avg_delivery_time,
                CAST(SUM(s.cost) AS DECIMAL(10,2)) AS total_cost,
                CAST(AVG(s.cost) AS DECIMAL(10,2)) AS avg_cost_per_shipment,
                CAST(SUM(s.weight) AS DECIMAL(10,2)) AS total_weight,
                COUNT(DISTINCT s.origin) AS unique_origins,
                COUNT(DISTINCT s.destination) AS unique_destinations
            FROM shipments s
            JOIN vehicle_logs vl ON s.log_id = vl.log_id AND s.trip_date = vl.trip_date
            GROUP BY DATE(vl.trip_date)
            "#,
        )
        .unique("idx_mv_daily_shipment_totals_date", "metric_date"),
        ViewDef::new(
            "mv_vehicle_daily_metrics",
            r#"
            SELECT
                DATE(vl.trip_date) AS metric_date,
                v.vehicle_id,
                v.name,
                v.total_mileage AS lifetime_mileage,
                COUNT(DISTINCT vl.log_id) AS trip_count,
                SUM(vl.mileage) AS daily_mileage,
                SUM(vl.fuel_used) AS daily_fuel,
                CAST(SUM(vl.mileage) / NULLIF(SUM(vl.fuel_used), 0) AS DECIMAL(10,2)) AS daily_fuel_efficiency,
                COUNT(DISTINCT s.shipment_id) AS daily_shipments,
                CAST(AVG(s.delivery_time) AS DECIMAL(10,2)) AS avg_delivery_time,
                CAST(SUM(s.cost) AS DECIMAL(10,2)) AS daily_revenue,
                s.origin,
                s.destination
            FROM vehicles v
            LEFT JOIN vehicle_logs vl ON v.vehicle_id = vl.vehicle_id
            LEFT JOIN shipments s ON vl.log_id = s.log_id
            WHERE vl.mileage IS NOT NULL
                AND vl.fuel_used IS NOT NULL
            GROUP BY DATE(vl.trip_date), v.vehicle_id, v.name, s.origin, s.destination
            "#,
        )
        .index("idx_mv_vehicle_metrics_date", "metric_date")
        .index("idx_mv_vehicle_metrics_id", "vehicle_id")
        .index("idx_mv_vehicle_metrics_revenue", "daily_revenue DESC")
        .index("idx_mv_vehicle_metrics_route", "origin, destination"),
    ]
}

/// Creates and refreshes the materialized views after each batch
pub struct ViewManager {
    store: Arc<PgStore>,
    views: Vec<ViewDef>,
}

impl ViewManager {
    pub fn new(store: Arc<PgStore>) -> Self {
        Self::with_views(store, default_views())
    }

    /// Manager over an explicit view list (kept in the given order)
    pub fn with_views(store: Arc<PgStore>, views: Vec<ViewDef>) -> Self {
        Self { store, views }
    }

    /// Create and refresh every view, in order
    #[instrument(skip(self), fields(db.system = "postgresql"))]
    pub async fn refresh_all(&self) -> Result<()> {
        for view in &self.views {
            self.setup_view(view).await?;
            self.refresh_view(view).await?;
        }
        info!(count = self.views.len(), "Materialized views refreshed");
        Ok(())
    }

    async fn setup_view(&self, view: &ViewDef) -> Result<()> {
        info!(view = %view.name, "Creating materialized view");
        self.execute(&format!(
            "CREATE MATERIALIZED VIEW IF NOT EXISTS {} AS {}",
            view.name, view.query
        ))
        .await?;

        for (index_name, columns) in &view.indexes {
            self.execute(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                index_name, view.name, columns
            ))
            .await?;
        }
        if let Some((index_name, columns)) = &view.unique_index {
            self.execute(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                index_name, view.name, columns
            ))
            .await?;
        }
        Ok(())
    }

    async fn refresh_view(&self, view: &ViewDef) -> Result<()> {
        info!(view = %view.name, "Refreshing materialized view");
        let concurrently = if view.unique_index.is_some() {
            "CONCURRENTLY "
        } else {
            ""
        };
        self.execute(&format!(
            "REFRESH MATERIALIZED VIEW {}{}",
            concurrently, view.name
        ))
        .await
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(self.store.pool()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trends_view_comes_after_its_source() {
        let views = default_views();
        let metrics = views
            .iter()
            .position(|v| v.name == "mv_daily_metrics")
            .expect("Daily metrics view should exist");
        let trends = views
            .iter()
            .position(|v| v.name == "mv_daily_trends")
            .expect("Daily trends view should exist");

        assert!(
            metrics < trends,
            "mv_daily_trends reads mv_daily_metrics and must come after it"
        );
        assert!(views[trends].query.contains("mv_daily_metrics"));
    }

    #[test]
    fn test_concurrent_refresh_requires_a_unique_index() {
        for view in default_views() {
            if view.name == "mv_daily_metrics" || view.name == "mv_daily_trends" {
                assert!(view.unique_index.is_some());
            }
        }
        // Multi-dimension views refresh non-concurrently
        let route = default_views()
            .into_iter()
            .find(|v| v.name == "mv_route_metrics")
            .expect("Route metrics view should exist");
        assert!(route.unique_index.is_none());
    }
}
