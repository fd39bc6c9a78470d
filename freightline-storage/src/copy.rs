//! Bulk COPY operations
//!
//! Rows arrive as COPY text: tab-delimited, newline-terminated, `\N` for
//! null. Each call is one COPY statement, so a success commits that
//! buffer's rows and a failure applies nothing.

use crate::{PgStore, Result};
use sqlx::postgres::PgConnection;
use std::time::Instant;
use tracing::{instrument, warn};

/// Build a COPY FROM STDIN statement for a table and column list
pub fn copy_statement(table: &str, columns: &[&str]) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT text)",
        table,
        columns.join(", ")
    )
}

impl PgStore {
    /// Bulk-insert pre-serialized COPY text rows into a table
    ///
    /// Returns the number of rows copied.
    #[instrument(
        skip(self, rows),
        fields(
            db.system = "postgresql",
            db.operation = "COPY",
            db.sql.table = %table,
        )
    )]
    pub async fn copy_rows(&self, table: &str, columns: &[&str], rows: &str) -> Result<u64> {
        let start = Instant::now();
        let mut conn = self.pool().acquire().await?;
        let copied = copy_rows_on(&mut conn, table, columns, rows).await?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 {
            warn!(
                table = %table,
                rows = copied,
                duration_ms = elapsed.as_millis(),
                "Slow bulk load detected"
            );
        }

        Ok(copied)
    }
}

/// Bulk-insert COPY text rows on a specific connection
///
/// Used by the staged validator, which must stay on one session for its
/// temporary staging table.
pub async fn copy_rows_on(
    conn: &mut PgConnection,
    table: &str,
    columns: &[&str],
    rows: &str,
) -> Result<u64> {
    let statement = copy_statement(table, columns);
    let mut copy = conn.copy_in_raw(&statement).await?;
    match copy.send(rows.as_bytes()).await {
        Ok(_) => {
            let copied = copy.finish().await?;
            Ok(copied)
        }
        Err(e) => {
            // Put the connection back into a usable state before returning
            let _ = copy.abort("bulk load failed").await;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_statement_lists_columns_in_order() {
        let stmt = copy_statement("vehicles", &["vehicle_id", "name", "total_mileage"]);
        assert_eq!(
            stmt,
            "COPY vehicles (vehicle_id, name, total_mileage) FROM STDIN WITH (FORMAT text)"
        );
    }
}
