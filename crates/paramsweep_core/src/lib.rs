//! Parameter sweep engine
//!
//! This crate expands a tree of named parameters into every concrete
//! combination, evaluates an external function at each combination on a
//! pool of workers, and shapes the resulting statistics into labeled grids
//! that can be persisted and merged across independently executed shards.
//! It supports:
//! - Scalar and sequence-valued parameters with dedup/sort policies
//! - Nested configuration trees with variant axes (one sweep axis whose
//!   values are whole sub-configurations)
//! - Deterministic Cartesian-product expansion, last axis fastest
//! - Nested worker pools (an outer sweep whose points each run an inner
//!   Monte-Carlo batch)
//! - Exact shard merging of count/mean/variance statistics
//!
//! # Example
//!
//! ```ignore
//! use paramsweep_core::{ConfigTree, Experiment, ExperimentSettings, MetricRegistry, ParameterOptions};
//!
//! let mut tree = ConfigTree::new("test");
//! tree.insert("graph.size", vec![10, 20], ParameterOptions::default())?;
//! tree.insert("coupling", vec![0.1, 0.2, 0.4], ParameterOptions::default())?;
//!
//! let mut registry = MetricRegistry::new();
//! registry.register_expectation("energy", 100, 4, |config, seed| {
//!     let size = config.get_i64("graph.size").ok_or("missing graph.size")?;
//!     let coupling = config.get_f64("coupling").ok_or("missing coupling")?;
//!     Ok(simulate_energy(size, coupling, seed))
//! });
//!
//! let settings = ExperimentSettings::default().with_metrics(["energy"]).with_seed(42);
//! let experiment = Experiment::launch("test", tree, "data/test", settings, registry, &["compute_metrics", "save"])?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod error;
pub mod experiment;
pub mod metrics;
pub mod pool;
pub mod sampling;
pub mod statistics;
pub mod storage;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod grid;
pub mod parameter;
pub mod value;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::{ConfigNode, ConfigTree, Expansion, LeafConfiguration, SweepAxis};
pub use error::{BoxError, Result, SweepError};
pub use experiment::{Experiment, ExperimentSettings, RunLog, Task};
pub use grid::{SweepGrid, format_data, unformat_data};
pub use metrics::{Metric, MetricData, MetricKind, MetricRegistry, Metrics};
pub use parameter::{Parameter, ParameterOptions};
pub use pool::WorkerPool;
pub use sampling::{Evaluator, Sample, SampleEngine};
pub use statistics::Statistic;
pub use value::{TypeTag, Value};
