//! Command-line front end for `paramsweep_core`
//!
//! Reads sweep description files, prints their expansion, combines shard
//! directories and inspects persisted experiments.

pub mod logging;
pub mod report;
pub mod sweep_file;

pub use logging::init_logging;
pub use report::{ExpansionReport, ExperimentReport};
pub use sweep_file::{SweepFormat, load_sweep, parse_sweep};
