//! Per-exercise training history persisted as JSON.
//!
//! The whole mapping is held in memory and written back after every change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::menu::{MenuCatalog, ParamId};

/// Last and best values recorded for one exercise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub last_a: f64,
    pub last_b: f64,
    pub best_a: f64,
    pub best_b: f64,
}

impl TrainingRecord {
    pub fn last(&self, id: ParamId) -> f64 {
        match id {
            ParamId::A => self.last_a,
            ParamId::B => self.last_b,
        }
    }

    pub fn best(&self, id: ParamId) -> f64 {
        match id {
            ParamId::A => self.best_a,
            ParamId::B => self.best_b,
        }
    }
}

pub type Records = BTreeMap<String, TrainingRecord>;

#[derive(Debug)]
pub enum HistoryError {
    Unreadable(PathBuf, io::Error),
    Corrupt(PathBuf, serde_json::Error),
    WriteFailed(PathBuf, io::Error),
    UnknownExercise(String),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Unreadable(path, e) => {
                write!(f, "failed to read history {}: {e}", path.display())
            }
            HistoryError::Corrupt(path, e) => {
                write!(f, "history {} is not valid: {e}", path.display())
            }
            HistoryError::WriteFailed(path, e) => {
                write!(f, "failed to save history {}: {e}", path.display())
            }
            HistoryError::UnknownExercise(name) => write!(f, "unknown exercise {name:?}"),
        }
    }
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HistoryError::Unreadable(_, e) | HistoryError::WriteFailed(_, e) => Some(e),
            HistoryError::Corrupt(_, e) => Some(e),
            HistoryError::UnknownExercise(_) => None,
        }
    }
}

/// How the history file looked when the store was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoad {
    /// No file yet.
    Fresh,
    Loaded(usize),
    /// The file existed but could not be used and was ignored.
    Discarded,
}

pub struct HistoryStore {
    path: PathBuf,
    catalog: Rc<MenuCatalog>,
    records: Records,
    load_status: HistoryLoad,
}

impl HistoryStore {
    /// Read the history file without any fallback.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Option<Records>, HistoryError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| HistoryError::Unreadable(path.to_path_buf(), e))?;
        let records = serde_json::from_str::<Records>(&data)
            .map_err(|e| HistoryError::Corrupt(path.to_path_buf(), e))?;
        Ok(Some(records))
    }

    /// Open the store, starting empty when the file is absent or unusable.
    pub fn open<P: Into<PathBuf>>(path: P, catalog: Rc<MenuCatalog>) -> Self {
        let path = path.into();
        let (records, load_status) = match Self::read(&path) {
            Ok(Some(records)) => {
                let n = records.len();
                log::info!("Loaded history for {n} exercises from {}", path.display());
                (records, HistoryLoad::Loaded(n))
            }
            Ok(None) => (Records::new(), HistoryLoad::Fresh),
            Err(e) => {
                log::warn!("Ignoring training history: {e}");
                (Records::new(), HistoryLoad::Discarded)
            }
        };
        Self {
            path,
            catalog,
            records,
            load_status,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_status(&self) -> HistoryLoad {
        self.load_status
    }

    pub fn set_catalog(&mut self, catalog: Rc<MenuCatalog>) {
        self.catalog = catalog;
    }

    fn resolve(&self, menu_name: &str) -> Result<String, HistoryError> {
        match self.catalog.find_by_tag_or_name(menu_name) {
            Some(name) => Ok(name.to_string()),
            None => {
                log::warn!("{menu_name:?} is not on the menu");
                Err(HistoryError::UnknownExercise(menu_name.to_string()))
            }
        }
    }

    /// Write the full mapping to disk.
    pub fn save(&self) -> Result<(), HistoryError> {
        write_records(&self.path, &self.records).map_err(|e| {
            log::error!("Failed to save history to {}: {e}", self.path.display());
            HistoryError::WriteFailed(self.path.clone(), e)
        })
    }

    /// Store the latest values for an exercise and raise its bests.
    ///
    /// A failed write leaves the new record in memory and returns
    /// [`HistoryError::WriteFailed`].
    pub fn update(
        &mut self,
        menu_name: &str,
        last_a: f64,
        last_b: f64,
    ) -> Result<TrainingRecord, HistoryError> {
        let name = self.resolve(menu_name)?;
        let current = self.records.get(&name).copied().unwrap_or_default();
        let record = TrainingRecord {
            last_a,
            last_b,
            best_a: current.best_a.max(last_a),
            best_b: current.best_b.max(last_b),
        };
        self.records.insert(name.clone(), record);
        self.save()?;
        log::info!(
            "Saved {name}: ({last_a}, {last_b}), best ({}, {})",
            record.best_a,
            record.best_b
        );
        Ok(record)
    }

    /// Latest record for an exercise.
    ///
    /// `None` only when the name is not on the menu; an exercise that was
    /// never recorded yields all zeros.
    pub fn get_last(&self, menu_name: &str) -> Option<TrainingRecord> {
        let name = self.catalog.find_by_tag_or_name(menu_name)?;
        Some(self.records.get(name).copied().unwrap_or_default())
    }

    /// Forget one exercise. Returns the removed record, if there was one.
    pub fn remove(&mut self, menu_name: &str) -> Result<Option<TrainingRecord>, HistoryError> {
        let name = self.resolve(menu_name)?;
        let Some(record) = self.records.remove(&name) else {
            log::warn!("No history stored for {name}");
            return Ok(None);
        };
        self.save()?;
        log::info!("Removed history for {name}");
        Ok(Some(record))
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.records.clear();
        self.save()?;
        log::info!("Cleared all training history");
        Ok(())
    }
}

fn write_records(path: &Path, records: &Records) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let data =
        serde_json::to_string_pretty(records).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    std::fs::write(path, data)
}
