//! Match history backends for the tester.
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info};
use stickit_game::{MatchId, MatchRecord, MatchStorage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read match history from {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write match history to {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("match history in {} is not valid JSON", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode match history")]
    Encode(#[source] serde_json::Error),
}

/// Match history kept as a JSON array on disk.
///
/// A missing file reads as an empty history. Saves rewrite the whole file
/// through a temporary sibling so a crash never leaves a truncated history.
#[derive(Debug, Clone)]
pub struct JsonHistoryStorage {
    path: PathBuf,
}

impl JsonHistoryStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<MatchRecord>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no history at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, records: &[MatchRecord]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(records).map_err(StorageError::Encode)?;
        let write_error = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_error)?;
        fs::rename(&tmp, &self.path).map_err(write_error)
    }
}

impl MatchStorage for JsonHistoryStorage {
    type Error = StorageError;

    fn save_match(&self, record: &MatchRecord) -> Result<MatchId, Self::Error> {
        let mut records = self.read_all()?;
        let id = next_id(&records);
        records.push(record.clone().with_id(id));
        self.write_all(&records)?;
        info!("saved match {id} to {}", self.path.display());
        Ok(id)
    }

    fn load_match_history(&self) -> Result<Vec<MatchRecord>, Self::Error> {
        self.read_all()
    }
}

/// In-process history shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    records: Rc<RefCell<Vec<MatchRecord>>>,
}

impl MemoryHistory {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }
}

impl MatchStorage for MemoryHistory {
    type Error = StorageError;

    fn save_match(&self, record: &MatchRecord) -> Result<MatchId, Self::Error> {
        let mut records = self.records.borrow_mut();
        let id = next_id(&records);
        records.push(record.clone().with_id(id));
        Ok(id)
    }

    fn load_match_history(&self) -> Result<Vec<MatchRecord>, Self::Error> {
        Ok(self.records.borrow().clone())
    }
}

/// History backend chosen on the command line.
#[derive(Debug, Clone)]
pub enum HistoryStore {
    Json(JsonHistoryStorage),
    Memory(MemoryHistory),
}

impl HistoryStore {
    #[must_use]
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or_else(
            || Self::Memory(MemoryHistory::default()),
            |path| Self::Json(JsonHistoryStorage::new(path)),
        )
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Json(storage) => storage.path().display().to_string(),
            Self::Memory(_) => "in-memory history".to_string(),
        }
    }
}

impl MatchStorage for HistoryStore {
    type Error = StorageError;

    fn save_match(&self, record: &MatchRecord) -> Result<MatchId, Self::Error> {
        match self {
            Self::Json(storage) => storage.save_match(record),
            Self::Memory(storage) => storage.save_match(record),
        }
    }

    fn load_match_history(&self) -> Result<Vec<MatchRecord>, Self::Error> {
        match self {
            Self::Json(storage) => storage.load_match_history(),
            Self::Memory(storage) => storage.load_match_history(),
        }
    }
}

fn next_id(records: &[MatchRecord]) -> MatchId {
    records
        .iter()
        .filter_map(|record| record.id)
        .max()
        .map_or(1, |id| id + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stickit_game::{Player, Team};

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "stickit-storage-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    fn record() -> MatchRecord {
        let teams = vec![
            Team::new(1, "Hawks", vec![Player::new(1, "Ana")]),
            Team::new(2, "Owls", vec![Player::new(2, "Ben")]),
        ];
        let date = Utc.with_ymd_and_hms(2025, 3, 10, 19, 0, 0).unwrap();
        MatchRecord::new(date, "Hawks", &teams, Vec::new())
    }

    #[test]
    fn missing_file_reads_as_empty_history() {
        let storage = JsonHistoryStorage::new(temp_path("missing").join("history.json"));
        assert!(storage.load_match_history().unwrap().is_empty());
    }

    #[test]
    fn saves_append_with_increasing_ids() {
        let dir = temp_path("append");
        let path = dir.join("nested").join("history.json");
        let storage = JsonHistoryStorage::new(&path);

        assert_eq!(storage.save_match(&record()).unwrap(), 1);
        assert_eq!(storage.save_match(&record()).unwrap(), 2);
        assert!(!path.with_extension("json.tmp").exists());

        let history = JsonHistoryStorage::new(&path).load_match_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].id, Some(2));
        assert_eq!(history[0].winner, "Hawks");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_history_is_a_parse_error() {
        let path = temp_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        let err = JsonHistoryStorage::new(&path)
            .load_match_history()
            .unwrap_err();
        assert!(matches!(err, StorageError::Parse { .. }));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn memory_history_is_shared_between_clones() {
        let store = HistoryStore::from_path(None);
        let clone = store.clone();
        store.save_match(&record()).unwrap();
        let id = clone.save_match(&record().with_id(40)).unwrap();
        assert_eq!(id, 2);
        assert_eq!(store.load_match_history().unwrap().len(), 2);
        assert_eq!(store.describe(), "in-memory history");
    }
}
