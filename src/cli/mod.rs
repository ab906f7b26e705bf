//! Command-line interface
//!
//! Three positional arguments name the experiment (observation table,
//! feature-list file, system); options tune the grid, seed, and artifact
//! store. Wrong argument count is a usage error before any processing.

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

use crate::dataset::{read_feature_list, Dataset};
use crate::model::ArtifactStore;
use crate::sweep::{SweepConfig, SweepRunner};
use crate::trainer::{NoopStage, RidgeStage};

#[derive(Parser)]
#[command(name = "rtsweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Model-selection sweep for retention-time prediction")]
pub struct Cli {
    /// Observation table (CSV with `time`, `IDENTIFIER`, and feature columns)
    pub input: PathBuf,

    /// Newline-delimited feature-list file
    pub features: PathBuf,

    /// System name used to build run keys
    pub system: String,

    /// Artifact store directory
    #[arg(long, default_value = "models")]
    pub artifacts: PathBuf,

    /// Seed for the experiment-wide random stream
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Training-set sizes to sweep
    #[arg(long, value_delimiter = ',', default_values_t = [20, 40, 60, 80, 100])]
    pub sizes: Vec<usize>,

    /// Repetitions per size
    #[arg(long, default_value = "5")]
    pub runs: usize,

    /// Score pre-existing artifacts without training
    #[arg(long)]
    pub skip_training: bool,
}

/// Load the inputs and run the sweep.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        input,
        features,
        system,
        artifacts,
        seed,
        sizes,
        runs,
        skip_training,
    } = cli;

    let feature_names = read_feature_list(&features)?;
    let dataset = Dataset::load(&input, &feature_names)?;

    let store = ArtifactStore::new(artifacts);
    tracing::info!(
        rows = dataset.n_rows(),
        features = dataset.feature_names().len(),
        artifacts = %store.base_dir().display(),
        "dataset loaded"
    );

    let config = SweepConfig::new(system)
        .with_sizes(sizes)
        .with_runs_per_size(runs);
    let rng = ChaCha8Rng::seed_from_u64(seed);

    if skip_training {
        SweepRunner::new(config, NoopStage, store, rng).run(&dataset)?;
    } else {
        let stage = RidgeStage::new(store.clone());
        SweepRunner::new(config, stage, store, rng).run(&dataset)?;
    }

    Ok(())
}
