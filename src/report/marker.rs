//! Marker files recording that a report window is open for a document
//!
//! Markers live in one directory per day; stale days are purged whenever the
//! current day's directory is prepared.

use crate::domain::issues::{RelayError, RelayResult};
use chrono::{Local, NaiveDate};
use sha2::{Digest, Sha224};
use std::fs;
use std::path::PathBuf;

/// Store of per-document marker files under a root directory
#[derive(Debug, Clone)]
pub struct MarkerStore {
    root: PathBuf,
}

impl MarkerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the system temporary directory
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("lint-relay"))
    }

    fn dir_on(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    /// Marker path for a document URL on the given day
    pub fn marker_path_on(&self, date: NaiveDate, url: &str) -> PathBuf {
        let mut hasher = Sha224::new();
        hasher.update(url.as_bytes());
        self.dir_on(date).join(format!("{:x}.marker", hasher.finalize()))
    }

    /// Marker path for a document URL today
    pub fn marker_path(&self, url: &str) -> PathBuf {
        self.marker_path_on(Local::now().date_naive(), url)
    }

    /// Create the directory for `date` and delete those of other days
    pub fn prepare_on(&self, date: NaiveDate) -> RelayResult<PathBuf> {
        let current = self.dir_on(date);
        fs::create_dir_all(&current).map_err(|e| {
            RelayError::marker(format!("Cannot create {}: {}", current.display(), e))
        })?;

        for entry in fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            if path == current || !path.is_dir() {
                continue;
            }
            if let Err(e) = fs::remove_dir_all(&path) {
                tracing::warn!("Could not remove stale marker directory {}: {}", path.display(), e);
            }
        }

        Ok(current)
    }

    /// Record that a report is open for `url`
    pub fn create(&self, url: &str) -> RelayResult<PathBuf> {
        let today = Local::now().date_naive();
        self.prepare_on(today)?;
        let path = self.marker_path_on(today, url);
        fs::write(&path, url.as_bytes())
            .map_err(|e| RelayError::marker(format!("Cannot write {}: {}", path.display(), e)))?;
        tracing::debug!("Created marker {}", path.display());
        Ok(path)
    }

    pub fn exists(&self, url: &str) -> bool {
        self.marker_path(url).is_file()
    }

    /// Remove the marker for `url`; returns whether one existed
    pub fn remove(&self, url: &str) -> RelayResult<bool> {
        let path = self.marker_path(url);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RelayError::marker(format!("Cannot remove {}: {}", path.display(), e))),
        }
    }
}
