//! # Freightline Core
//!
//! Domain model for the Freightline ingestion pipeline: source tables,
//! record handling, batch identifiers, and per-record validation.

pub mod batch;
pub mod record;
pub mod table;
pub mod validate;

// Re-export commonly used types
pub use batch::BatchId;
pub use record::SourceRecord;
pub use table::{SourceTable, NULL_SENTINEL};
pub use validate::{validate_trip_log, ValidateFn};

/// Result type for Freightline core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Freightline core operations
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
