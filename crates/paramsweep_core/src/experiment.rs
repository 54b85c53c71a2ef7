//! Task pipeline over one sweep and its persisted state.
//!
//! An [`Experiment`] owns a [`ConfigTree`], the metrics computed over it and
//! the directory they are persisted to. [`Experiment::run`] drives the
//! pipeline `load -> compute_metrics -> save -> combine_shards` (or any
//! subset, in the given order), bracketed by [`Experiment::begin`] and
//! [`Experiment::end`].

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::config::ConfigTree;
use crate::error::{Result, SweepError};
use crate::metrics::{MetricRegistry, Metrics};
use crate::pool::WorkerPool;
use crate::storage::{ExperimentStore, read_json, write_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Load,
    ComputeMetrics,
    Save,
    CombineShards,
}

impl Task {
    /// Every task, in pipeline order
    pub const ALL: [Task; 4] = [
        Task::Load,
        Task::ComputeMetrics,
        Task::Save,
        Task::CombineShards,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Load => "load",
            Task::ComputeMetrics => "compute_metrics",
            Task::Save => "save",
            Task::CombineShards => "combine_shards",
        }
    }
}

impl FromStr for Task {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        Task::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| SweepError::InvalidTask {
                task: s.to_string(),
                valid: Task::ALL.map(|t| t.as_str()).join(", "),
            })
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSettings {
    /// Base seed threaded into every evaluation
    pub seed: u64,
    /// Workers of the outer pool over leaf configurations
    pub num_workers: usize,
    /// Metric names, resolved through the registry
    pub metrics: Vec<String>,
    /// Directory scanned for shards by the `combine_shards` task
    pub shard_root: Option<PathBuf>,
    /// Directories skipped while scanning for shards
    pub excluded: Vec<PathBuf>,
    pub config_filename: String,
    pub log_filename: String,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            seed: u64::try_from(Timestamp::now().as_second()).unwrap_or_default(),
            num_workers: 1,
            metrics: Vec::new(),
            shard_root: None,
            excluded: Vec::new(),
            config_filename: "config.json".to_string(),
            log_filename: "log.json".to_string(),
        }
    }
}

impl ExperimentSettings {
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    #[must_use]
    pub fn with_metrics<S: Into<String>>(mut self, metrics: impl IntoIterator<Item = S>) -> Self {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    fn store(&self, root: impl Into<PathBuf>) -> ExperimentStore {
        ExperimentStore::new(root, &self.config_filename, &self.log_filename)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: Task,
    pub started: Timestamp,
    pub elapsed_seconds: f64,
}

/// Lifecycle record of the last run of an experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub begin: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub seed: Option<u64>,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug)]
pub struct Experiment {
    name: String,
    config: ConfigTree,
    settings: ExperimentSettings,
    store: ExperimentStore,
    registry: MetricRegistry,
    metrics: BTreeMap<String, Metrics>,
    log: RunLog,
    saved: bool,
}

impl Experiment {
    /// Experiment over `config`, persisted under `path`.
    pub fn new(
        name: impl Into<String>,
        config: ConfigTree,
        path: impl Into<PathBuf>,
        settings: ExperimentSettings,
    ) -> Self {
        let store = settings.store(path);
        Self {
            name: name.into(),
            config,
            settings,
            store,
            registry: MetricRegistry::new(),
            metrics: BTreeMap::new(),
            log: RunLog::default(),
            saved: false,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: MetricRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build an experiment and run `tasks` on it (every task if empty).
    pub fn launch<S: AsRef<str>>(
        name: impl Into<String>,
        config: ConfigTree,
        path: impl Into<PathBuf>,
        settings: ExperimentSettings,
        registry: MetricRegistry,
        tasks: &[S],
    ) -> Result<Self> {
        let mut experiment = Self::new(name, config, path, settings).with_registry(registry);
        experiment.run(tasks)?;
        Ok(experiment)
    }

    /// Reconstruct an experiment from its persisted directory.
    pub fn load_from_path(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        settings: ExperimentSettings,
    ) -> Result<Self> {
        let store = settings.store(path);
        if !store.has_config() {
            return Err(SweepError::persistence(
                store.config_path(),
                "no persisted configuration",
            ));
        }
        let config = store.load_config()?;
        let mut metrics = BTreeMap::new();
        for metric_name in store.metric_names()? {
            if let Some(m) = store.load_metrics(&metric_name)? {
                metrics.insert(metric_name, m);
            }
        }
        let log_path = store.log_path();
        let log = if log_path.is_file() {
            read_json(&log_path)?
        } else {
            RunLog::default()
        };
        tracing::debug!(path = %store.root().display(), metrics = metrics.len(), "loaded experiment");
        Ok(Self {
            name: name.into(),
            config,
            settings,
            store,
            registry: MetricRegistry::new(),
            metrics,
            log,
            saved: false,
        })
    }

    /// Merge every shard found under `root` and save the result to
    /// `destination`.
    ///
    /// A shard is any directory holding a persisted configuration; shards
    /// are not searched for nested shards. `excluded` directories and
    /// `destination` itself are skipped. Every shard's tree is renamed to
    /// `name` before merging.
    pub fn combine_shards(
        name: impl Into<String>,
        root: &Path,
        destination: &Path,
        excluded: &[PathBuf],
    ) -> Result<Self> {
        let settings = ExperimentSettings {
            excluded: excluded.to_vec(),
            ..ExperimentSettings::default()
        };
        let mut skip = excluded.to_vec();
        skip.push(destination.to_path_buf());
        let shards = discover_shards(root, &skip, &settings.config_filename)?;

        let name = name.into();
        let mut shards = shards.into_iter();
        let first = shards
            .next()
            .ok_or_else(|| SweepError::persistence(root, "no shards found"))?;
        let mut combined = Self::load_from_path(name.clone(), &first, settings.clone())?;
        combined.rename_config(&name);
        for shard in shards {
            let mut other = Self::load_from_path(name.clone(), &shard, settings.clone())?;
            other.rename_config(&name);
            combined.merge_with(&other)?;
        }
        combined.store = settings.store(destination);
        combined.save()?;
        tracing::info!(destination = %destination.display(), "combined shards");
        Ok(combined)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &ConfigTree {
        &self.config
    }

    #[must_use]
    pub fn settings(&self) -> &ExperimentSettings {
        &self.settings
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.store.root()
    }

    #[must_use]
    pub fn metrics(&self) -> &BTreeMap<String, Metrics> {
        &self.metrics
    }

    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&Metrics> {
        self.metrics.get(name)
    }

    #[must_use]
    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Run `tasks` in the given order, or every task if `tasks` is empty.
    ///
    /// Every name is checked before anything runs, so an unknown task leaves
    /// no output behind. A failing task aborts the rest of the pipeline and
    /// skips [`Experiment::end`].
    pub fn run<S: AsRef<str>>(&mut self, tasks: &[S]) -> Result<()> {
        let tasks: Vec<Task> = if tasks.is_empty() {
            Task::ALL.to_vec()
        } else {
            tasks
                .iter()
                .map(|t| t.as_ref().parse::<Task>())
                .collect::<Result<_>>()?
        };

        self.begin();
        for task in tasks {
            let started = Timestamp::now();
            let clock = Instant::now();
            tracing::info!(experiment = %self.name, %task, "running task");
            match task {
                Task::Load => self.load()?,
                Task::ComputeMetrics => self.compute_metrics()?,
                Task::Save => self.save()?,
                Task::CombineShards => self.merge_shards()?,
            }
            self.log.tasks.push(TaskRecord {
                task,
                started,
                elapsed_seconds: clock.elapsed().as_secs_f64(),
            });
        }
        self.end()
    }

    pub fn begin(&mut self) {
        self.log = RunLog {
            begin: Some(Timestamp::now()),
            end: None,
            seed: Some(self.settings.seed),
            tasks: Vec::new(),
        };
        self.saved = false;
    }

    /// Close the run log; rewritten to disk if the run saved.
    pub fn end(&mut self) -> Result<()> {
        self.log.end = Some(Timestamp::now());
        if self.saved {
            write_json(&self.store.log_path(), &self.log)?;
        }
        tracing::info!(experiment = %self.name, tasks = self.log.tasks.len(), "run finished");
        Ok(())
    }

    /// Restore persisted metric bundles.
    ///
    /// Missing files restore nothing. Bundles saved for a different
    /// configuration are ignored.
    pub fn load(&mut self) -> Result<()> {
        if !self.store.has_config() {
            tracing::debug!(path = %self.store.root().display(), "nothing to load");
            return Ok(());
        }
        let saved = self.store.load_config()?;
        if !saved.is_equivalent(&self.config) {
            tracing::warn!(
                path = %self.store.root().display(),
                "persisted configuration differs, not restoring metrics"
            );
            return Ok(());
        }
        for name in self.store.metric_names()? {
            if let Some(metrics) = self.store.load_metrics(&name)? {
                tracing::debug!(metric = %name, "restored metric");
                self.metrics.insert(name, metrics);
            }
        }
        Ok(())
    }

    /// Compute every configured metric that is not already present.
    pub fn compute_metrics(&mut self) -> Result<()> {
        let pool = WorkerPool::new(self.settings.num_workers)?;
        for name in &self.settings.metrics {
            if self.metrics.contains_key(name) {
                tracing::info!(metric = %name, "already computed, skipping");
                continue;
            }
            let metric = self.registry.get(name)?;
            let computed = metric.compute(&self.config, self.settings.seed, &pool)?;
            self.metrics.insert(name.clone(), computed);
        }
        Ok(())
    }

    /// Write the configuration, the run log and every metric bundle.
    ///
    /// Metric names are checked first, so a name clashing with the
    /// configuration or log file writes nothing.
    pub fn save(&mut self) -> Result<()> {
        for name in self.metrics.keys() {
            self.store.check_metric_name(name)?;
        }
        self.store.save_config(&self.config)?;
        for metrics in self.metrics.values() {
            self.store.save_metrics(metrics)?;
        }
        write_json(&self.store.log_path(), &self.log)?;
        self.saved = true;
        tracing::info!(path = %self.store.root().display(), "saved experiment");
        Ok(())
    }

    /// Merge every shard under `settings.shard_root` into this experiment,
    /// then save the result to its own directory.
    ///
    /// Shards are renamed to this experiment's tree name before merging.
    pub fn merge_shards(&mut self) -> Result<()> {
        let Some(root) = self.settings.shard_root.clone() else {
            tracing::debug!("no shard root configured");
            return Ok(());
        };
        let mut skip = self.settings.excluded.clone();
        skip.push(self.store.root().to_path_buf());
        let tree_name = self.config.name().to_string();
        let mut merged = 0;
        for shard in discover_shards(&root, &skip, &self.settings.config_filename)? {
            let mut other = Self::load_from_path(&self.name, &shard, self.settings.clone())?;
            other.rename_config(&tree_name);
            self.merge_with(&other)?;
            merged += 1;
            tracing::info!(shard = %shard.display(), "merged shard");
        }
        if merged > 0 {
            self.save()?;
        }
        Ok(())
    }

    /// Rename the configuration tree, moving every metric grid to the
    /// variant label it has under the new name.
    pub fn rename_config(&mut self, name: &str) {
        if self.config.name() == name {
            return;
        }
        let before: Vec<String> = self.config.variants().into_iter().map(|(l, _)| l).collect();
        self.config.set_name(name);
        let renames: BTreeMap<String, String> = before
            .into_iter()
            .zip(self.config.variants().into_iter().map(|(l, _)| l))
            .collect();
        for metrics in self.metrics.values_mut() {
            metrics.relabel(&renames);
        }
    }

    /// Merge the configuration and every metric of `other`.
    ///
    /// Both trees must carry the same name. Nothing changes if the
    /// configurations or any metric grid are incompatible.
    pub fn merge_with(&mut self, other: &Experiment) -> Result<()> {
        if self.config.name() != other.config.name() {
            return Err(SweepError::IncompatibleShape(format!(
                "cannot merge tree `{}` into `{}`",
                other.config.name(),
                self.config.name()
            )));
        }
        let mut config = self.config.clone();
        config.merge_with(&other.config)?;

        let mut merged = BTreeMap::new();
        for (name, theirs) in &other.metrics {
            let combined = match self.metrics.get(name) {
                Some(ours) => {
                    let mut ours = ours.clone();
                    ours.merge_with(theirs)?;
                    ours
                }
                None => theirs.clone(),
            };
            merged.insert(name.clone(), combined);
        }

        self.config = config;
        self.metrics.extend(merged);
        Ok(())
    }

    /// Delete every persisted file of this experiment.
    pub fn clean(&self) -> Result<()> {
        self.store.clean()
    }
}

/// Directories under `root` holding a file named `config_filename`, sorted.
pub fn discover_shards(root: &Path, skip: &[PathBuf], config_filename: &str) -> Result<Vec<PathBuf>> {
    let skip: Vec<PathBuf> = skip.iter().map(|p| normalize(p)).collect();
    let mut shards = Vec::new();
    visit(root, &skip, config_filename, &mut shards)?;
    Ok(shards)
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn visit(dir: &Path, skip: &[PathBuf], config_filename: &str, shards: &mut Vec<PathBuf>) -> Result<()> {
    if skip.contains(&normalize(dir)) {
        return Ok(());
    }
    if dir.join(config_filename).is_file() {
        shards.push(dir.to_path_buf());
        return Ok(());
    }
    let entries = fs::read_dir(dir)
        .map_err(|e| SweepError::persistence(dir, format!("failed to read directory: {e}")))?;
    // symlinked directories are not followed
    let mut children: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .map(|entry| entry.path())
        .collect();
    children.sort();
    for child in children {
        visit(&child, skip, config_filename, shards)?;
    }
    Ok(())
}
