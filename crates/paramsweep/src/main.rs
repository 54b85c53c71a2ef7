use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use paramsweep::{ExpansionReport, ExperimentReport, init_logging, load_sweep};
use paramsweep_core::{Experiment, ExperimentSettings};

#[derive(Parser, Debug)]
#[command(name = "paramsweep")]
#[command(about = "Expand parameter sweeps, combine shards and inspect results")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Write logs to `<dir>/paramsweep.log` instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the expansion of a YAML or JSON sweep file
    Expand {
        file: PathBuf,

        /// Tree name (default: the file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Number of leaf configurations to print
        #[arg(short = 'k', long, default_value_t = 10)]
        limit: usize,
    },
    /// Merge every shard found under a directory into one experiment
    Combine {
        root: PathBuf,

        /// Experiment name shared by the shards
        #[arg(short, long)]
        name: String,

        /// Parent directory of the combined experiment (default: ROOT)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Shard directories to leave out
        #[arg(short, long)]
        exclude: Vec<PathBuf>,
    },
    /// Print a persisted experiment
    Show {
        dir: PathBuf,

        /// Experiment name (default: the directory name)
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(args.log_dir.as_deref(), &args.log_level)?;

    match args.command {
        Command::Expand { file, name, limit } => {
            let tree = load_sweep(&file, name.as_deref())?;
            print!("{}", ExpansionReport::new(&tree, limit));
        }
        Command::Combine {
            root,
            name,
            dest,
            exclude,
        } => {
            let destination = dest.unwrap_or_else(|| root.clone()).join(&name);
            let combined = Experiment::combine_shards(&name, &root, &destination, &exclude)?;
            tracing::info!("combined shards into {}", destination.display());
            print!("{}", ExperimentReport::new(&combined));
        }
        Command::Show { dir, name } => {
            let name = match name {
                Some(name) => name,
                None => dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| eyre!("cannot derive an experiment name from {}", dir.display()))?
                    .to_string(),
            };
            let experiment = Experiment::load_from_path(name, &dir, ExperimentSettings::default())?;
            print!("{}", ExperimentReport::new(&experiment));
        }
    }
    Ok(())
}
