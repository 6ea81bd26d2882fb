// src/storage/mod.rs
pub mod reconcile;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{DATASET_FILE, SUMMARY_FILE};
use crate::gamelogs::models::{GameRecord, COLUMNS};
use crate::gamelogs::staleness::LastDateIndex;
use crate::utils::error::StorageError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads and rewrites the game-log dataset and its run summary.
pub struct DatasetStore {
    base_dir: PathBuf,
}

impl DatasetStore {
    /// Creates a new DatasetStore with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.base_dir.join(DATASET_FILE)
    }

    /// Loads the persisted dataset. A missing file is an empty dataset; an
    /// unreadable one is logged and also treated as empty, which makes this
    /// run a full rebuild.
    pub fn load(&self) -> Vec<GameRecord> {
        let path = self.dataset_path();
        if !path.exists() {
            tracing::info!("No existing dataset at {}; starting fresh", path.display());
            return Vec::new();
        }

        match self.read_records(&path) {
            Ok(records) => {
                tracing::info!("Loaded {} existing game records from {}", records.len(), path.display());
                records
            }
            Err(e) => {
                tracing::warn!("Could not read {} ({}); rebuilding from scratch", path.display(), e);
                Vec::new()
            }
        }
    }

    fn read_records(&self, path: &Path) -> Result<Vec<GameRecord>, StorageError> {
        let bytes = fs::read(path)?;
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(body);
        let headers = reader.headers()?.clone();
        if headers.iter().ne(COLUMNS.iter().copied()) {
            return Err(StorageError::Corrupt(format!(
                "expected {} columns starting with Player, found: {:?}",
                COLUMNS.len(),
                headers.iter().take(4).collect::<Vec<_>>()
            )));
        }

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let record = GameRecord::from_row(row.iter())
                .ok_or_else(|| StorageError::Corrupt(format!("row {} has {} fields", line + 2, row.len())))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Rewrites the whole dataset (BOM, header, one row per game). Writes to a
    /// sibling temp file first so a crash never leaves a half-written dataset.
    pub fn save(&self, records: &[GameRecord]) -> Result<PathBuf, StorageError> {
        let path = self.dataset_path();
        let tmp_path = path.with_extension("csv.tmp");

        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(UTF8_BOM)?;
            let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
            writer.write_record(COLUMNS)?;
            for record in records {
                writer.write_record(record.to_row())?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &path)?;

        tracing::info!("Saved {} game records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Saves metadata about the run in JSON format
    pub fn save_summary<T: Serialize>(&self, summary: &T) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(SUMMARY_FILE);
        let summary_str = serde_json::to_string_pretty(summary)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, summary_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved run summary to {}", file_path.display());
        Ok(file_path)
    }
}

/// Latest parseable game date per player. Players with no parseable date
/// are left out and count as new.
pub fn last_date_index(records: &[GameRecord]) -> LastDateIndex {
    let mut index = LastDateIndex::new();
    for record in records {
        if let Some(date) = record.parsed_date() {
            index
                .entry(record.player.clone())
                .and_modify(|latest| {
                    if date > *latest {
                        *latest = date;
                    }
                })
                .or_insert(date);
        }
    }
    index
}
