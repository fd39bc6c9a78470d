//! Quarantine artifacts and the processed-file archive
//!
//! Records that cannot be committed are durably parked under the data
//! directory, partitioned by reason: `failed/<table>_<timestamp>.txt` holds
//! raw COPY rows that exhausted their load retries, `invalid/<table>_invalid.json`
//! holds records rejected by validation. Nothing here is read back by the
//! pipeline; external remediation consumes the files.

use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writes quarantine artifacts and archives processed source files
#[derive(Debug, Clone)]
pub struct Quarantine {
    data_dir: PathBuf,
}

impl Quarantine {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Park raw COPY rows that failed to load
    ///
    /// The file name carries a microsecond timestamp so repeated failures
    /// for the same table never overwrite each other.
    pub fn save_failed_rows(&self, table: &str, rows: &str) -> Result<PathBuf> {
        let failed_dir = self.data_dir.join("failed");
        fs::create_dir_all(&failed_dir)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let path = failed_dir.join(format!("{}_{}.txt", table, timestamp));

        fs::write(&path, rows)?;
        warn!(table = %table, path = %path.display(), "Failed rows quarantined");
        Ok(path)
    }

    /// Write the run's invalid records as one JSON array
    ///
    /// Written once per run per table; a rerun overwrites the previous
    /// run's artifact for that table.
    pub fn save_invalid_records(&self, table: &str, records: &[serde_json::Value]) -> Result<PathBuf> {
        let invalid_dir = self.data_dir.join("invalid");
        fs::create_dir_all(&invalid_dir)?;

        let path = invalid_dir.join(format!("{}_invalid.json", table));
        let body = serde_json::to_string_pretty(records)
            .map_err(|e| crate::Error::Internal(format!("Invalid-record encoding: {}", e)))?;

        fs::write(&path, body)?;
        warn!(
            table = %table,
            count = records.len(),
            path = %path.display(),
            "Invalid records quarantined"
        );
        Ok(path)
    }

    /// Move a fully processed source file into the archive
    ///
    /// Idempotent: a destination that already exists means the file was
    /// archived by an earlier run, so this is a no-op success.
    pub fn archive_source(&self, source: &Path) -> Result<PathBuf> {
        let processed_dir = self.data_dir.join("processed");
        fs::create_dir_all(&processed_dir)?;

        let base_name = source
            .file_name()
            .ok_or_else(|| crate::Error::Internal(format!("No file name: {}", source.display())))?;
        let destination = processed_dir.join(base_name);

        if destination.exists() {
            info!(path = %destination.display(), "Source already archived");
            return Ok(destination);
        }

        fs::rename(source, &destination)?;
        info!(
            from = %source.display(),
            to = %destination.display(),
            "Source file archived"
        );
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_rows_never_overwrite_each_other() {
        let dir = tempfile::tempdir().expect("Temp dir");
        let quarantine = Quarantine::new(dir.path());

        let first = quarantine
            .save_failed_rows("shipments", "S001\tA\tB\n")
            .expect("First save");
        let second = quarantine
            .save_failed_rows("shipments", "S002\tC\tD\n")
            .expect("Second save");

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).expect("First file"), "S001\tA\tB\n");
        assert_eq!(fs::read_to_string(&second).expect("Second file"), "S002\tC\tD\n");
    }

    #[test]
    fn test_invalid_records_are_a_json_array() {
        let dir = tempfile::tempdir().expect("Temp dir");
        let quarantine = Quarantine::new(dir.path());

        let records = vec![json!({"log_id": "L999"}), json!({"log_id": ""})];
        let path = quarantine
            .save_invalid_records("vehicle_logs", &records)
            .expect("Save invalid");

        assert_eq!(path.file_name().unwrap(), "vehicle_logs_invalid.json");
        let parsed: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(&path).expect("Read back"))
                .expect("Valid JSON array");
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_archive_moves_the_source() {
        let dir = tempfile::tempdir().expect("Temp dir");
        let quarantine = Quarantine::new(dir.path());

        let source = dir.path().join("vehicles.json");
        fs::write(&source, "[]").expect("Write source");

        let archived = quarantine.archive_source(&source).expect("Archive");
        assert!(!source.exists());
        assert!(archived.exists());
        assert_eq!(archived, dir.path().join("processed/vehicles.json"));
    }

    #[test]
    fn test_archive_is_idempotent_when_destination_exists() {
        let dir = tempfile::tempdir().expect("Temp dir");
        let quarantine = Quarantine::new(dir.path());

        let processed = dir.path().join("processed");
        fs::create_dir_all(&processed).expect("Processed dir");
        fs::write(processed.join("vehicles.json"), "[]").expect("Existing archive");

        // Source re-created after a previous archive; the archive step
        // must not fail and must leave the existing archive untouched.
        let source = dir.path().join("vehicles.json");
        fs::write(&source, "[{}]").expect("Write source");

        let archived = quarantine.archive_source(&source).expect("Idempotent archive");
        assert_eq!(
            fs::read_to_string(&archived).expect("Archive content"),
            "[]"
        );
    }
}
