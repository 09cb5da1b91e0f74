use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::domain::CTVError;
use crate::record::Dataset;

/// Keeps the last loaded dataset between sessions.
pub trait Persistence {
    fn save(&mut self, dataset: &Dataset) -> Result<(), CTVError>;
    fn restore(&self) -> Result<Option<Dataset>, CTVError>;
    fn clear(&mut self) -> Result<(), CTVError>;
}

/// Stores the dataset as JSON in a single file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Persistence for JsonFileStore {
    fn save(&mut self, dataset: &Dataset) -> Result<(), CTVError> {
        let json = serde_json::to_string(dataset)?;
        fs::write(&self.path, json)?;
        debug!("Saved {} rows to {:?}", dataset.len(), self.path);
        Ok(())
    }

    fn restore(&self) -> Result<Option<Dataset>, CTVError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Dataset>(&content) {
            Ok(dataset) if dataset.is_empty() => Ok(None),
            Ok(dataset) => Ok(Some(dataset)),
            Err(e) => {
                warn!("Ignoring unreadable state file {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    fn clear(&mut self) -> Result<(), CTVError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Option<Dataset>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with(dataset: Dataset) -> Self {
        Self {
            saved: Some(dataset),
        }
    }
}

#[cfg(test)]
impl Persistence for MemoryStore {
    fn save(&mut self, dataset: &Dataset) -> Result<(), CTVError> {
        self.saved = Some(dataset.clone());
        Ok(())
    }

    fn restore(&self) -> Result<Option<Dataset>, CTVError> {
        Ok(self.saved.clone())
    }

    fn clear(&mut self) -> Result<(), CTVError> {
        self.saved = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoPersistence;

impl Persistence for NoPersistence {
    fn save(&mut self, _dataset: &Dataset) -> Result<(), CTVError> {
        Ok(())
    }

    fn restore(&self) -> Result<Option<Dataset>, CTVError> {
        Ok(None)
    }

    fn clear(&mut self) -> Result<(), CTVError> {
        Ok(())
    }
}
