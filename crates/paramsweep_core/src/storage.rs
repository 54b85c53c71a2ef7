//! Per-experiment file storage.
//!
//! Directory structure:
//! ```text
//! <root>/
//!   config.json        # serialized ConfigTree
//!   log.json           # run log
//!   <metric>.json      # one Metrics bundle per metric
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ConfigTree;
use crate::error::{Result, SweepError};
use crate::metrics::Metrics;

const EXTENSION: &str = "json";

/// Serialize `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| SweepError::persistence(parent, format!("failed to create directory: {e}")))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SweepError::persistence(path, format!("failed to serialize: {e}")))?;
    fs::write(path, json).map_err(|e| SweepError::persistence(path, format!("failed to write: {e}")))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| SweepError::persistence(path, format!("failed to read: {e}")))?;
    serde_json::from_str(&content)
        .map_err(|e| SweepError::persistence(path, format!("failed to parse: {e}")))
}

/// Paths of one persisted experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentStore {
    root: PathBuf,
    config_filename: String,
    log_filename: String,
}

impl ExperimentStore {
    pub fn new(
        root: impl Into<PathBuf>,
        config_filename: impl Into<String>,
        log_filename: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            config_filename: config_filename.into(),
            log_filename: log_filename.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join(&self.config_filename)
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.root.join(&self.log_filename)
    }

    #[must_use]
    pub fn metric_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{EXTENSION}"))
    }

    #[must_use]
    pub fn has_config(&self) -> bool {
        self.config_path().is_file()
    }

    pub fn load_config(&self) -> Result<ConfigTree> {
        read_json(&self.config_path())
    }

    pub fn save_config(&self, config: &ConfigTree) -> Result<()> {
        write_json(&self.config_path(), config)
    }

    /// Metric bundle `name`, or `None` if it was never saved
    pub fn load_metrics(&self, name: &str) -> Result<Option<Metrics>> {
        let path = self.metric_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        Metrics::load(&path).map(Some)
    }

    /// Fails if a bundle called `name` would not get a file of its own in
    /// the root, next to the configuration and the log.
    pub fn check_metric_name(&self, name: &str) -> Result<()> {
        let file_name = format!("{name}.{EXTENSION}");
        let reserved = file_name == self.config_filename || file_name == self.log_filename;
        if name.is_empty() || name.contains(['/', '\\']) || reserved {
            return Err(SweepError::persistence(
                self.metric_path(name),
                format!("`{name}` cannot be used as a metric file name"),
            ));
        }
        Ok(())
    }

    pub fn save_metrics(&self, metrics: &Metrics) -> Result<()> {
        self.check_metric_name(metrics.name())?;
        metrics.save(&self.metric_path(metrics.name()))
    }

    /// Names of every saved metric bundle, sorted
    pub fn metric_names(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root)
            .map_err(|e| SweepError::persistence(&self.root, format!("failed to read directory: {e}")))?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if file_name == self.config_filename || file_name == self.log_filename {
                continue;
            }
            if path.is_file()
                && path.extension().is_some_and(|ext| ext == EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove the config, the log and every metric bundle, then the root
    /// directory if nothing else is left in it.
    pub fn clean(&self) -> Result<()> {
        let mut paths = vec![self.config_path(), self.log_path()];
        paths.extend(self.metric_names()?.iter().map(|name| self.metric_path(name)));
        for path in paths {
            if path.is_file() {
                fs::remove_file(&path)
                    .map_err(|e| SweepError::persistence(&path, format!("failed to delete: {e}")))?;
            }
        }
        let is_empty = fs::read_dir(&self.root).is_ok_and(|mut entries| entries.next().is_none());
        if is_empty {
            fs::remove_dir(&self.root)
                .map_err(|e| SweepError::persistence(&self.root, format!("failed to delete: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> ExperimentStore {
        ExperimentStore::new(dir.join("exp"), "config.json", "log.json")
    }

    #[test]
    fn test_metric_names_skip_config_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        write_json(&store.config_path(), &ConfigTree::new("exp")).unwrap();
        write_json(&store.log_path(), &"log").unwrap();
        store.save_metrics(&Metrics::new("magnetization")).unwrap();
        store.save_metrics(&Metrics::new("energy")).unwrap();
        fs::write(store.root().join("notes.txt"), "x").unwrap();

        assert_eq!(store.metric_names().unwrap(), vec!["energy", "magnetization"]);
    }

    #[test]
    fn test_missing_metric_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(dir.path()).load_metrics("energy").unwrap().is_none());
        assert!(store(dir.path()).metric_names().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.metric_path("energy"), "{ not json").unwrap();
        assert!(matches!(
            store.load_metrics("energy"),
            Err(SweepError::Persistence { .. })
        ));
    }

    #[test]
    fn test_reserved_metric_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for name in ["config", "log", "", "nested/energy"] {
            assert!(matches!(
                store.save_metrics(&Metrics::new(name)),
                Err(SweepError::Persistence { .. })
            ));
        }
        assert!(!store.root().exists());
        assert!(store.check_metric_name("energy").is_ok());
    }

    #[test]
    fn test_clean_removes_experiment_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save_config(&ConfigTree::new("exp")).unwrap();
        store.save_metrics(&Metrics::new("energy")).unwrap();
        store.clean().unwrap();
        assert!(!store.root().exists());
    }
}
