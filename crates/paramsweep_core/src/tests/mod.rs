//! Integration tests for the paramsweep engine
//!
//! Tests are organized by topic:
//! - `expansion` - Configuration tree expansion, variants, merge
//! - `merging` - Exact shard statistic merging
//! - `shaping` - Metric grids per variant label, nested pools
//! - `pipeline` - Experiment tasks, persistence and shard combination

mod shaping;
