//! # Freightline Refresh
//!
//! Post-ingest stage of the Freightline pipeline: a long-lived listener on
//! the batch-completion channel, and the orchestrator it triggers to run
//! index maintenance and materialized-view refresh behind the
//! calculation-status flag.

pub mod indexes;
pub mod listener;
pub mod orchestrator;
pub mod views;

// Re-export commonly used types
pub use indexes::IndexManager;
pub use listener::{CompletionListener, ListenerHandle};
pub use orchestrator::RefreshOrchestrator;
pub use views::{default_views, ViewDef, ViewManager};

/// Result type for refresh operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for refresh operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] freightline_storage::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
