//! Batch identifiers
//!
//! One batch covers a full ingestion run across all three source files. Ids
//! are time-derived (`BATCH_<date>_<time>_...`) so operators can correlate
//! them with file drops, with microseconds and a process-wide counter
//! appended so rapid successive runs never collide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static BATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for one ingestion batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(String);

impl BatchId {
    /// Allocate a fresh batch identifier
    pub fn generate() -> Self {
        let now = chrono::Utc::now();
        let seq = BATCH_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;
        Self(format!(
            "BATCH_{}_{:06}_{:04}",
            now.format("%Y%m%d_%H%M%S"),
            now.timestamp_subsec_micros(),
            seq
        ))
    }

    /// Wrap an existing identifier (read back from the tracking table)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_have_batch_prefix() {
        let id = BatchId::generate();
        assert!(id.as_str().starts_with("BATCH_"));
    }

    #[test]
    fn test_rapid_generation_never_collides() {
        let ids: HashSet<String> = (0..1000)
            .map(|_| BatchId::generate().as_str().to_string())
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_wrapped_id_round_trips() {
        let id = BatchId::new("BATCH_20250101_000000_000000_0001");
        assert_eq!(id.to_string(), "BATCH_20250101_000000_000000_0001");
    }
}
