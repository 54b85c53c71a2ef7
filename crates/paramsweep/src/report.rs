//! Plain-text reports printed by the binary

use std::fmt;

use paramsweep_core::{ConfigTree, Experiment, MetricData};

/// Summary of a sweep before it runs: the tree, its leaf count, the grid
/// shape of every variant label and the first `limit` leaves.
pub struct ExpansionReport<'a> {
    tree: &'a ConfigTree,
    limit: usize,
}

impl<'a> ExpansionReport<'a> {
    pub fn new(tree: &'a ConfigTree, limit: usize) -> Self {
        Self { tree, limit }
    }
}

impl fmt::Display for ExpansionReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)?;
        writeln!(f, "leaf configurations: {}", self.tree.len())?;

        for (label, group) in self.tree.variants() {
            let shape = group.shape().unwrap_or_default();
            writeln!(f, "  {label}: shape {shape:?} ({} leaves)", group.len())?;
        }

        let shown = self.limit.min(self.tree.len());
        if shown > 0 {
            writeln!(f, "first {shown}:")?;
            for leaf in self.tree.enumerate().take(shown) {
                writeln!(f, "  [{}] {leaf}", leaf.index())?;
            }
        }
        Ok(())
    }
}

/// Contents of a persisted experiment: its configuration and, per metric and
/// label, the grid axes and mean values.
pub struct ExperimentReport<'a> {
    experiment: &'a Experiment,
}

impl<'a> ExperimentReport<'a> {
    pub fn new(experiment: &'a Experiment) -> Self {
        Self { experiment }
    }
}

fn write_grid(f: &mut fmt::Formatter<'_>, data: &MetricData) -> fmt::Result {
    for axis in &data.axes {
        let values: Vec<String> = axis.values.iter().map(ToString::to_string).collect();
        writeln!(f, "      {}: [{}]", axis.path, values.join(", "))?;
    }
    writeln!(f, "    shape: {:?}", data.shape())?;
    if let Some(mean) = data.summary("mean") {
        let values: Vec<String> = mean.data().iter().map(|m| format!("{m:.6}")).collect();
        writeln!(f, "    mean: [{}]", values.join(", "))?;
    }
    Ok(())
}

impl fmt::Display for ExperimentReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let experiment = self.experiment;
        writeln!(f, "experiment {} ({})", experiment.name(), experiment.path().display())?;
        write!(f, "{}", experiment.config())?;

        if experiment.metrics().is_empty() {
            return writeln!(f, "no metrics");
        }
        for (name, metrics) in experiment.metrics() {
            writeln!(f, "metric {name}")?;
            for (label, data) in metrics.data() {
                writeln!(f, "  {label}")?;
                writeln!(f, "    axes:")?;
                write_grid(f, data)?;
            }
        }
        Ok(())
    }
}
