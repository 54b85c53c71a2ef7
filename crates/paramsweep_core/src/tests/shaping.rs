//! Tests for shaping metric results into labelled grids
//!
//! These tests verify:
//! - One grid per variant label, with dimensions in traversal order
//! - Flattened results follow expansion order
//! - Hierarchical pools give the same result as a sequential run

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};

use crate::config::{ConfigTree, LeafConfiguration};
use crate::error::{BoxError, SweepError};
use crate::grid::{format_data, unformat_data};
use crate::metrics::MetricRegistry;
use crate::parameter::ParameterOptions;
use crate::pool::WorkerPool;
use crate::value::Value;

fn opts() -> ParameterOptions {
    ParameterOptions::default()
}

fn model_tree() -> ConfigTree {
    let mut ising = ConfigTree::new("ising");
    ising
        .insert("coupling", vec![0.5, 1.0, 1.5, 2.0, 2.5], opts())
        .unwrap();
    let mut sis = ConfigTree::new("sis");
    sis.insert("infection_prob", vec![0.2, 0.4, 0.6], opts())
        .unwrap();

    let mut tree = ConfigTree::new("test");
    tree.insert_variants("dynamics", vec![ising, sis]).unwrap();
    tree.insert("graph.size", vec![10, 20, 40, 80], opts())
        .unwrap();
    tree
}

/// Normal draw centred on whichever rate parameter the model has
fn noisy_rate(config: &LeafConfiguration, seed: u64) -> Result<f64, BoxError> {
    let rate = config
        .get_f64("dynamics.coupling")
        .or_else(|| config.get_f64("dynamics.infection_prob"))
        .ok_or("no rate parameter")?;
    let size = config.get_f64("graph.size").ok_or("missing size")?;
    let mut rng = SmallRng::seed_from_u64(seed);
    Ok(Normal::new(rate * size, 1.0)?.sample(&mut rng))
}

#[test]
fn test_one_grid_per_variant() {
    let mut registry = MetricRegistry::new();
    registry.register_expectation("rate", 8, 2, noisy_rate);
    let metrics = registry
        .get("rate")
        .unwrap()
        .compute(&model_tree(), 1, &WorkerPool::new(2).unwrap())
        .unwrap();

    let labels: Vec<&str> = metrics.labels().collect();
    assert_eq!(labels, vec!["test.ising", "test.sis"]);

    let formatted = metrics.formatted();
    assert_eq!(formatted["test.ising"]["mean"].shape(), &[5, 4]);
    assert_eq!(formatted["test.sis"]["mean"].shape(), &[3, 4]);

    let unformatted = metrics.unformatted();
    assert_eq!(unformatted["test.ising"]["mean"].len(), 5 * 4);
    assert_eq!(unformatted["test.sis"]["stderr"].len(), 3 * 4);
    assert!(unformatted["test.sis"]["count"].iter().all(|&c| c == 8.0));
}

#[test]
fn test_grid_axes_label_dimensions() {
    let mut registry = MetricRegistry::new();
    registry.register_point_estimate("rate", noisy_rate);
    let metrics = registry
        .get("rate")
        .unwrap()
        .compute(&model_tree(), 0, &WorkerPool::sequential())
        .unwrap();

    let data = metrics.get("test.sis").unwrap();
    let paths: Vec<&str> = data.axes.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(paths, vec!["dynamics.infection_prob", "graph.size"]);
    assert_eq!(data.axes[1].values[2], Value::Int(40));
}

#[test]
fn test_flattened_means_follow_expansion_order() {
    let mut tree = ConfigTree::new("test");
    tree.insert("a", vec![1, 2, 3], opts()).unwrap();
    tree.insert("b", vec![1, 2], opts()).unwrap();

    let mut registry = MetricRegistry::new();
    registry.register_point_estimate("product", |config, _| {
        let a = config.get_f64("a").ok_or("missing a")?;
        let b = config.get_f64("b").ok_or("missing b")?;
        Ok(a * 10.0 + b)
    });
    let metrics = registry
        .get("product")
        .unwrap()
        .compute(&tree, 0, &WorkerPool::new(3).unwrap())
        .unwrap();

    let expected: Vec<f64> = tree
        .enumerate()
        .map(|leaf| leaf.get_f64("a").unwrap() * 10.0 + leaf.get_f64("b").unwrap())
        .collect();
    let unformatted = metrics.unformatted();
    let flat = &unformatted["test"]["mean"];
    assert_eq!(flat, &expected);

    let regridded = format_data(&[3, 2], flat.clone()).unwrap();
    assert_eq!(regridded, metrics.formatted()["test"]["mean"]);
    assert_eq!(unformat_data(&regridded), expected);
}

#[test]
fn test_nested_pools_match_sequential_run() {
    let mut registry = MetricRegistry::new();
    registry.register_expectation("nested", 32, 3, noisy_rate);
    registry.register_expectation("flat", 32, 1, noisy_rate);
    let tree = model_tree();

    let nested = registry
        .get("nested")
        .unwrap()
        .compute(&tree, 9, &WorkerPool::new(2).unwrap())
        .unwrap();
    let flat = registry
        .get("flat")
        .unwrap()
        .compute(&tree, 9, &WorkerPool::sequential())
        .unwrap();

    assert_eq!(nested.unformatted(), flat.unformatted());
}

#[test]
fn test_failing_leaf_fails_the_sweep() {
    let mut tree = ConfigTree::new("test");
    tree.insert("a", vec![1, 2], opts()).unwrap();
    tree.insert("b", vec![1, 2, 3], opts()).unwrap();

    let mut registry = MetricRegistry::new();
    registry.register_point_estimate("fragile", |config, _| {
        if config.get_i64("a") == Some(2) {
            Err("a = 2 is unstable".into())
        } else {
            Ok(1.0)
        }
    });
    let err = registry
        .get("fragile")
        .unwrap()
        .compute(&tree, 0, &WorkerPool::sequential())
        .unwrap_err();
    assert!(matches!(err, SweepError::BatchExecution { index: 3, .. }));
}
