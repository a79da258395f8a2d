//! File-per-record history store.
//!
//! # File Structure
//!
//! ```text
//! <data_dir>/history/
//! ├── <record-id>.json
//! └── ...
//! ```
//!
//! Writes go to `<id>.json.tmp` first and are renamed into place. Scans skip
//! temp files and log (then skip) files that fail to parse.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{HistoryRecord, HistoryStats, NewHistoryRecord};
use crate::error::PersistenceError;

/// Durable store of finished sessions.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a new record and return its id.
    pub fn save(&self, record: NewHistoryRecord) -> Result<String, PersistenceError> {
        self.save_at(record, Utc::now())
    }

    /// [`save`](Self::save) with an explicit timestamp.
    pub fn save_at(
        &self,
        record: NewHistoryRecord,
        now: DateTime<Utc>,
    ) -> Result<String, PersistenceError> {
        fs::create_dir_all(&self.dir)?;

        let id = Uuid::new_v4().to_string();
        let record = record.into_record(id.clone(), now);

        let file_path = self.dir.join(format!("{id}.json"));
        let temp_path = self.dir.join(format!("{id}.json.tmp"));

        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &file_path)?;

        log::debug!("Saved history record {} to {}", id, file_path.display());
        Ok(id)
    }

    /// All records, most recent first.
    pub fn list_all(&self) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let mut records: Vec<HistoryRecord> = self
            .record_files()?
            .into_iter()
            .filter_map(|path| read_record(&path))
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Ids that could not have been issued by [`save`](Self::save) are not found.
    pub fn get(&self, id: &str) -> Result<Option<HistoryRecord>, PersistenceError> {
        let Some(path) = self.record_path(id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Remove a record. Deleting a missing record is not an error, and an id
    /// that is not a record id never touches the filesystem.
    pub fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let Some(path) = self.record_path(id) else {
            log::warn!("Ignoring delete of invalid history id {id:?}");
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Deleted history record {id}");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Case-insensitive substring search over query and report.
    ///
    /// A blank keyword matches nothing.
    pub fn search(&self, keyword: &str) -> Result<Vec<HistoryRecord>, PersistenceError> {
        if keyword.trim().is_empty() {
            return Ok(Vec::new());
        }
        let needle = keyword.to_lowercase();

        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| {
                r.query.to_lowercase().contains(&needle) || r.report.to_lowercase().contains(&needle)
            })
            .collect())
    }

    pub fn stats(&self) -> Result<HistoryStats, PersistenceError> {
        let mut stats = HistoryStats::default();
        for path in self.record_files()? {
            let Some(record) = read_record(&path) else {
                continue;
            };
            stats.total_records += 1;
            stats.total_bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            stats.oldest = Some(match stats.oldest {
                Some(t) => t.min(record.created_at),
                None => record.created_at,
            });
            stats.newest = Some(match stats.newest {
                Some(t) => t.max(record.created_at),
                None => record.created_at,
            });
        }
        Ok(stats)
    }

    /// Record ids are uuids; anything else would let the id escape `dir`.
    fn record_path(&self, id: &str) -> Option<PathBuf> {
        let id = Uuid::parse_str(id).ok()?;
        Some(self.dir.join(format!("{}.json", id.hyphenated())))
    }

    fn record_files(&self) -> Result<Vec<PathBuf>, PersistenceError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            // `<id>.json.tmp` has extension "tmp" and is skipped here
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn read_record(path: &Path) -> Option<HistoryRecord> {
    let parsed = fs::read_to_string(path)
        .map_err(PersistenceError::from)
        .and_then(|contents| serde_json::from_str(&contents).map_err(PersistenceError::from));
    match parsed {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Skipping unreadable history record {}: {}", path.display(), e);
            None
        }
    }
}

fn sort_newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

// ============================================================================
// TESTS
// ============================================================================
