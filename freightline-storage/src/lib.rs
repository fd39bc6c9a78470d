//! # Freightline Storage
//!
//! PostgreSQL layer for the Freightline ingestion pipeline: connection
//! pooling, schema management, bulk COPY, staged cross-table validation,
//! batch completion tracking, and the calculation-status flag.

pub mod batch;
pub mod copy;
pub mod models;
pub mod postgres;
pub mod schema;
pub mod staging;
pub mod status;

// Re-export commonly used types
pub use batch::{BatchTracker, BATCH_COMPLETE_CHANNEL};
pub use models::{BatchStatusModel, SystemStatusModel, SystemStatusSnapshot};
pub use postgres::{PgStore, PoolConfig};
pub use schema::SchemaManager;
pub use staging::StagedBatchOutcome;
pub use status::CalculationStatusTracker;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
