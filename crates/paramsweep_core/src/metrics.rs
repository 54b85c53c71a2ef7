//! Metric evaluation over a sweep and shard merging.
//!
//! A [`Metric`] pairs an [`Evaluator`] with a [`MetricKind`]. Computing it
//! over a [`ConfigTree`] produces a [`Metrics`] bundle: one [`MetricData`]
//! per variant label, holding a [`Statistic`] for every leaf configuration
//! laid out on a [`SweepGrid`] whose dimensions are the tree's sequenced
//! parameters in traversal order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigTree, LeafConfiguration, SweepAxis};
use crate::error::{BoxError, Result, SweepError};
use crate::grid::{SweepGrid, format_data, unformat_data};
use crate::parameter::multiset_union;
use crate::pool::WorkerPool;
use crate::sampling::{Evaluator, SampleEngine, Sample};
use crate::statistics::Statistic;
use crate::storage;
use crate::value::Value;

/// Summary keys exposed by [`Metrics::formatted`]
pub const STAT_KEYS: [&str; 4] = ["count", "mean", "std", "stderr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    /// One evaluation per leaf at the experiment seed
    PointEstimate,
    /// Monte-Carlo estimate over `num_samples` consecutive seeds, sampled on
    /// an inner pool of `num_workers` workers
    Expectation {
        num_samples: usize,
        num_workers: usize,
    },
}

#[derive(Clone)]
pub struct Metric {
    name: String,
    kind: MetricKind,
    evaluator: Arc<dyn Evaluator>,
}

impl Metric {
    pub fn new(name: impl Into<String>, kind: MetricKind, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            name: name.into(),
            kind,
            evaluator,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Workers of the sub-pool each leaf evaluation runs on
    #[must_use]
    pub fn inner_workers(&self) -> usize {
        match self.kind {
            MetricKind::PointEstimate => 1,
            MetricKind::Expectation { num_workers, .. } => num_workers,
        }
    }

    /// Evaluate at one leaf configuration, sampling on `pool` if needed.
    pub fn eval(
        &self,
        config: &LeafConfiguration,
        seed: u64,
        pool: &WorkerPool,
    ) -> std::result::Result<Statistic, BoxError> {
        match self.kind {
            MetricKind::PointEstimate => {
                let sample: Sample = self.evaluator.evaluate(config, seed)?;
                Ok(Statistic::from_samples(&[sample]))
            }
            MetricKind::Expectation { num_samples, .. } => {
                let engine = SampleEngine::new(self.evaluator.as_ref(), pool, seed);
                Ok(engine.statistic(config, num_samples)?)
            }
        }
    }

    /// Evaluate over every leaf of `tree`, one shaped grid per variant label.
    ///
    /// Leaves run on `pool`; each leaf gets its own sub-pool of
    /// [`Metric::inner_workers`] workers.
    pub fn compute(&self, tree: &ConfigTree, seed: u64, pool: &WorkerPool) -> Result<Metrics> {
        let mut metrics = Metrics::new(&self.name);
        for (label, group) in tree.variants() {
            let axes = group.axes();
            let shape: Vec<usize> = axes.iter().map(|a| a.values.len()).collect();
            let leaves: Vec<LeafConfiguration> = group.enumerate().collect();
            tracing::info!(
                metric = %self.name,
                label = %label,
                leaves = leaves.len(),
                ?shape,
                "computing metric"
            );
            let stats = pool.compute_nested(&leaves, self.inner_workers(), |sub_pool, _, leaf| {
                self.eval(leaf, seed, sub_pool)
            })?;
            let stats = format_data(&shape, stats)?;
            metrics.insert(label, MetricData { axes, stats })?;
        }
        Ok(metrics)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Metric name to metric lookup
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, Metric>,
}

impl MetricRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metric: Metric) -> &mut Self {
        self.metrics.insert(metric.name.clone(), metric);
        self
    }

    pub fn register_point_estimate<F>(&mut self, name: impl Into<String>, evaluator: F) -> &mut Self
    where
        F: Fn(&LeafConfiguration, u64) -> std::result::Result<Sample, BoxError> + Send + Sync + 'static,
    {
        self.register(Metric::new(name, MetricKind::PointEstimate, Arc::new(evaluator)))
    }

    pub fn register_expectation<F>(
        &mut self,
        name: impl Into<String>,
        num_samples: usize,
        num_workers: usize,
        evaluator: F,
    ) -> &mut Self
    where
        F: Fn(&LeafConfiguration, u64) -> std::result::Result<Sample, BoxError> + Send + Sync + 'static,
    {
        let kind = MetricKind::Expectation {
            num_samples,
            num_workers,
        };
        self.register(Metric::new(name, kind, Arc::new(evaluator)))
    }

    pub fn get(&self, name: &str) -> Result<&Metric> {
        self.metrics
            .get(name)
            .ok_or_else(|| SweepError::UnknownMetric(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Statistics of one metric for one variant label, with the axes that
/// label its grid dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    pub axes: Vec<SweepAxis>,
    pub stats: SweepGrid<Statistic>,
}

impl MetricData {
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.stats.shape()
    }

    /// Grid of one summary key (`count`, `mean`, `std` or `stderr`)
    #[must_use]
    pub fn summary(&self, key: &str) -> Option<SweepGrid<f64>> {
        let pick: fn(&Statistic) -> f64 = match key {
            "count" => |s: &Statistic| s.count as f64,
            "mean" => |s: &Statistic| s.mean,
            "std" => Statistic::std,
            "stderr" => Statistic::stderr,
            _ => return None,
        };
        Some(self.stats.map(pick))
    }

    /// Merge cell by cell, keyed by axis coordinates.
    ///
    /// Axes must name the same parameters in the same order. Axis values are
    /// unioned; cells present on one side only keep their statistic and
    /// cells present on neither side are empty.
    pub fn merge(&self, other: &MetricData) -> Result<MetricData> {
        let same_paths = self.axes.len() == other.axes.len()
            && self.axes.iter().zip(&other.axes).all(|(a, b)| a.path == b.path);
        if !same_paths {
            let paths = |axes: &[SweepAxis]| {
                axes.iter().map(|a| a.path.as_str()).collect::<Vec<_>>().join(", ")
            };
            return Err(SweepError::IncompatibleShape(format!(
                "metric axes [{}] do not match [{}]",
                paths(&self.axes),
                paths(&other.axes)
            )));
        }

        let axes: Vec<SweepAxis> = self
            .axes
            .iter()
            .zip(&other.axes)
            .map(|(a, b)| union_axis(a, b))
            .collect();
        let shape: Vec<usize> = axes.iter().map(|a| a.values.len()).collect();
        let mut stats = SweepGrid::new(shape, Statistic::empty());

        for side in [self, other] {
            let lookup: Vec<Vec<usize>> = side
                .axes
                .iter()
                .zip(&axes)
                .map(|(from, to)| positions(&from.values, &to.values))
                .collect::<Option<_>>()
                .ok_or_else(|| {
                    SweepError::IncompatibleShape("metric axis values are missing from their union".into())
                })?;
            for (indices, stat) in side.stats.iter() {
                let target: Vec<usize> = indices
                    .iter()
                    .zip(&lookup)
                    .map(|(&i, table)| table[i])
                    .collect();
                if let Some(cell) = stats.get_mut(&target) {
                    cell.merge_in(stat);
                }
            }
        }

        Ok(MetricData { axes, stats })
    }
}

/// Slot in `to` of every entry of `from`. The k-th copy of a repeated value
/// goes to the k-th copy in `to`.
fn positions(from: &[Value], to: &[Value]) -> Option<Vec<usize>> {
    let mut slots: FxHashMap<&Value, Vec<usize>> = FxHashMap::default();
    for (i, v) in to.iter().enumerate() {
        slots.entry(v).or_default().push(i);
    }
    let mut seen: FxHashMap<&Value, usize> = FxHashMap::default();
    from.iter()
        .map(|v| {
            let k = seen.entry(v).or_default();
            let slot = slots.get(v).and_then(|s| s.get(*k)).copied();
            *k += 1;
            slot
        })
        .collect()
}

fn union_axis(a: &SweepAxis, b: &SweepAxis) -> SweepAxis {
    let mut values = multiset_union(&a.values, &b.values);
    if a.sorted {
        values.sort();
    }
    SweepAxis {
        path: a.path.clone(),
        values,
        sorted: a.sorted,
    }
}

/// Every computed grid of one named metric, keyed by variant label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    name: String,
    data: BTreeMap<String, MetricData>,
}

impl Metrics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data(&self) -> &BTreeMap<String, MetricData> {
        &self.data
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&MetricData> {
        self.data.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Add the grid of one label; its shape must match its axes.
    pub fn insert(&mut self, label: impl Into<String>, data: MetricData) -> Result<()> {
        let expected: Vec<usize> = data.axes.iter().map(|a| a.values.len()).collect();
        if expected != data.stats.shape() {
            return Err(SweepError::IncompatibleShape(format!(
                "grid of shape {:?} does not match its axes {expected:?}",
                data.stats.shape()
            )));
        }
        self.data.insert(label.into(), data);
        Ok(())
    }

    /// `label -> summary key -> shaped grid`
    #[must_use]
    pub fn formatted(&self) -> BTreeMap<String, BTreeMap<String, SweepGrid<f64>>> {
        self.data
            .iter()
            .map(|(label, data)| {
                let grids = STAT_KEYS
                    .iter()
                    .filter_map(|key| data.summary(key).map(|g| ((*key).to_string(), g)))
                    .collect();
                (label.clone(), grids)
            })
            .collect()
    }

    /// `label -> summary key -> values in expansion order`
    #[must_use]
    pub fn unformatted(&self) -> BTreeMap<String, BTreeMap<String, Vec<f64>>> {
        self.formatted()
            .into_iter()
            .map(|(label, grids)| {
                let flat = grids
                    .into_iter()
                    .map(|(key, grid)| (key, unformat_data(&grid)))
                    .collect();
                (label, flat)
            })
            .collect()
    }

    /// Move every grid stored under a key of `renames` to the mapped label.
    pub fn relabel(&mut self, renames: &BTreeMap<String, String>) {
        self.data = std::mem::take(&mut self.data)
            .into_iter()
            .map(|(label, data)| (renames.get(&label).cloned().unwrap_or(label), data))
            .collect();
    }

    /// Merge every label of `other` into this bundle.
    ///
    /// Labels present on both sides merge with [`MetricData::merge`]; labels
    /// present only in `other` are copied. Nothing changes on error.
    pub fn merge_with(&mut self, other: &Metrics) -> Result<()> {
        if self.name != other.name {
            return Err(SweepError::IncompatibleShape(format!(
                "cannot merge metric `{}` into `{}`",
                other.name, self.name
            )));
        }
        let mut merged = BTreeMap::new();
        for (label, theirs) in &other.data {
            let data = match self.data.get(label) {
                Some(ours) => ours.merge(theirs)?,
                None => theirs.clone(),
            };
            merged.insert(label.clone(), data);
        }
        self.data.extend(merged);
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        storage::write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        storage::read_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterOptions;

    fn axis(path: &str, values: Vec<i64>) -> SweepAxis {
        SweepAxis {
            path: path.to_string(),
            values: values.into_iter().map(Value::Int).collect(),
            sorted: true,
        }
    }

    fn data(axes: Vec<SweepAxis>, samples: Vec<f64>) -> MetricData {
        let shape: Vec<usize> = axes.iter().map(|a| a.values.len()).collect();
        let stats: Vec<Statistic> = samples
            .into_iter()
            .map(|x| Statistic::from_samples(&[x]))
            .collect();
        MetricData {
            axes,
            stats: format_data(&shape, stats).unwrap(),
        }
    }

    fn sum_evaluator(config: &LeafConfiguration, _seed: u64) -> std::result::Result<Sample, BoxError> {
        let a = config.get_f64("a").ok_or("missing a")?;
        let b = config.get_f64("b").ok_or("missing b")?;
        Ok(a + b)
    }

    #[test]
    fn test_unknown_metric() {
        let registry = MetricRegistry::new();
        assert!(matches!(registry.get("nope"), Err(SweepError::UnknownMetric(_))));
    }

    #[test]
    fn test_point_estimate_grid_follows_expansion() {
        let mut tree = ConfigTree::new("test");
        tree.insert("a", vec![1, 2], ParameterOptions::default()).unwrap();
        tree.insert("b", vec![10, 20, 30], ParameterOptions::default()).unwrap();

        let mut registry = MetricRegistry::new();
        registry.register_point_estimate("sum", sum_evaluator);
        let metrics = registry
            .get("sum")
            .unwrap()
            .compute(&tree, 0, &WorkerPool::sequential())
            .unwrap();

        let data = metrics.get("test").unwrap();
        assert_eq!(data.shape(), &[2, 3]);
        let means = metrics.unformatted()["test"]["mean"].clone();
        assert_eq!(means, vec![11.0, 21.0, 31.0, 12.0, 22.0, 32.0]);
        assert_eq!(metrics.formatted()["test"]["mean"].get(&[1, 0]), Some(&12.0));
    }

    #[test]
    fn test_merge_unions_axis_values() {
        let left = data(vec![axis("n", vec![1, 2])], vec![10.0, 20.0]);
        let right = data(vec![axis("n", vec![2, 3])], vec![40.0, 30.0]);
        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.axes[0].values, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let means: Vec<f64> = merged.stats.data().iter().map(|s| s.mean).collect();
        assert_eq!(means, vec![10.0, 30.0, 30.0]);
        assert_eq!(merged.stats.data()[1].count, 2);
    }

    #[test]
    fn test_merge_fills_missing_cells_with_empty_statistic() {
        let left = data(vec![axis("a", vec![1]), axis("b", vec![1])], vec![1.0]);
        let right = data(vec![axis("a", vec![2]), axis("b", vec![2])], vec![2.0]);
        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.shape(), &[2, 2]);
        assert!(merged.stats.get(&[0, 1]).unwrap().is_empty());
        assert!(merged.stats.get(&[1, 0]).unwrap().is_empty());
        assert_eq!(merged.stats.get(&[1, 1]).unwrap().mean, 2.0);
    }

    #[test]
    fn test_merge_matches_repeated_values_by_occurrence() {
        let left = data(vec![axis("x", vec![1, 1, 2])], vec![1.0, 2.0, 3.0]);
        let right = data(vec![axis("x", vec![1, 2, 2])], vec![5.0, 6.0, 7.0]);
        let merged = left.merge(&right).unwrap();

        assert_eq!(merged.axes[0].values, [1, 1, 2, 2].map(Value::Int).to_vec());
        let counts: Vec<u64> = merged.stats.data().iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![2, 1, 2, 1]);
        let means: Vec<f64> = merged.stats.data().iter().map(|s| s.mean).collect();
        assert_eq!(means, vec![3.0, 2.0, 4.5, 7.0]);
    }

    #[test]
    fn test_relabel_moves_grids() {
        let mut metrics = Metrics::new("m");
        metrics
            .insert("run_0", data(vec![axis("n", vec![1])], vec![1.0]))
            .unwrap();
        let renames = BTreeMap::from([("run_0".to_string(), "test".to_string())]);
        metrics.relabel(&renames);
        assert_eq!(metrics.labels().collect::<Vec<_>>(), vec!["test"]);
    }

    #[test]
    fn test_merge_rejects_different_axes() {
        let left = data(vec![axis("a", vec![1])], vec![1.0]);
        let right = data(vec![axis("b", vec![1])], vec![1.0]);
        assert!(matches!(left.merge(&right), Err(SweepError::IncompatibleShape(_))));
    }

    #[test]
    fn test_insert_rejects_mismatched_grid() {
        let mut metrics = Metrics::new("m");
        let bad = MetricData {
            axes: vec![axis("a", vec![1, 2, 3])],
            stats: SweepGrid::new(vec![2], Statistic::empty()),
        };
        assert!(metrics.insert("test", bad).is_err());
        assert!(metrics.is_empty());
    }
}
