//! # Freightline Ingest
//!
//! Streaming ingestion runtime for the Freightline pipeline: JSON array
//! streaming, record buffering, bulk loading with bounded retry,
//! quarantine handling, and the per-file processors driven by one batch
//! run.

pub mod buffer;
pub mod config;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod processors;
pub mod quarantine;
pub mod retry;
pub mod run;
pub mod stream;

// Re-export commonly used types
pub use buffer::RowBuffer;
pub use config::IngestConfig;
pub use loader::{BulkLoader, LoadOutcome};
pub use pipeline::{FileReport, StreamPipeline};
pub use processors::{ShipmentProcessor, VehicleLogProcessor, VehicleProcessor};
pub use quarantine::Quarantine;
pub use retry::RetryPolicy;
pub use run::{IngestRunner, RunSummary};
pub use stream::{JsonArrayStream, StreamItem};

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ingestion operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Source file not found: {0}")]
    SourceMissing(String),

    #[error("Malformed source stream: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] freightline_storage::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
