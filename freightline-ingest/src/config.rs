//! Ingestion run configuration
//!
//! Loaded from environment variables with validated defaults. The data
//! directory holds the four reserved locations: `raw/` for incoming files,
//! `processed/` for the archive, `failed/` and `invalid/` for quarantine.

use crate::Result;
use freightline_core::SourceTable;
use std::env;
use std::path::PathBuf;

/// Default records per bulk-load buffer
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default bulk-load attempts before quarantining a buffer
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default data directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Configuration for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root directory for raw, processed, and quarantine files
    pub data_dir: PathBuf,

    /// Records accumulated before each bulk load
    pub batch_size: usize,

    /// Bulk-load attempts before a buffer is quarantined
    pub max_retries: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DATA_DIR`: Root data directory (default: "data")
    /// - `BATCH_SIZE`: Records per bulk-load buffer (default: 10000)
    /// - `MAX_RETRIES`: Bulk-load attempts per buffer (default: 3)
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());

        let batch_size = match env::var("BATCH_SIZE") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|e| crate::Error::Config(format!("Invalid BATCH_SIZE: {}", e)))?,
            Err(_) => DEFAULT_BATCH_SIZE,
        };

        let max_retries = match env::var("MAX_RETRIES") {
            Ok(raw) => raw
                .parse::<u32>()
                .map_err(|e| crate::Error::Config(format!("Invalid MAX_RETRIES: {}", e)))?,
            Err(_) => DEFAULT_MAX_RETRIES,
        };

        let config = Self {
            data_dir: PathBuf::from(data_dir),
            batch_size,
            max_retries,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(crate::Error::Config("batch_size must be > 0".to_string()));
        }
        if self.max_retries == 0 {
            return Err(crate::Error::Config("max_retries must be > 0".to_string()));
        }
        Ok(())
    }

    /// Expected source file location for a table
    pub fn raw_path(&self, table: SourceTable) -> PathBuf {
        self.data_dir.join("raw").join(table.source_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = IngestConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = IngestConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_raw_paths_follow_layout() {
        let config = IngestConfig::default();
        assert_eq!(
            config.raw_path(SourceTable::Vehicles),
            PathBuf::from("data/raw/vehicles.json")
        );
        assert_eq!(
            config.raw_path(SourceTable::Shipments),
            PathBuf::from("data/raw/shipments.json")
        );
    }
}
