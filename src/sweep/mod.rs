//! Experiment-grid driver
//!
//! Orchestrates the double loop over sample sizes and run repetitions.
//! Each sweep cell runs SPLIT → TRAIN → SCORE → UPDATE in sequence; split
//! validation failures abort the whole experiment, training-data failures
//! skip the cell, and everything below that degrades per model kind.

use crate::dataset::Dataset;
use crate::error::{Result, SweepError};
use crate::model::ArtifactStore;
use crate::scoring::{score_cell, CellResult};
use crate::split::{k_fold, CellSplit, FoldAssignments, MIN_TEST_ROWS, N_FOLDS};
use crate::tracker::BestTracker;
use crate::trainer::{TrainingStage, TRAINING_SLOTS};
use colored::*;
use rand::Rng;

/// Experiment grid configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// System name used to build run keys.
    pub system: String,
    /// Training-set sizes, outer loop of the grid.
    pub sizes: Vec<usize>,
    /// Repetitions per size, inner loop of the grid.
    pub runs_per_size: usize,
    /// Minimum held-out rows per cell.
    pub min_test_rows: usize,
    /// Folds in every training fold plan.
    pub n_folds: usize,
}

impl SweepConfig {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            sizes: vec![20, 40, 60, 80, 100],
            runs_per_size: 5,
            min_test_rows: MIN_TEST_ROWS,
            n_folds: N_FOLDS,
        }
    }

    pub fn with_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn with_runs_per_size(mut self, runs: usize) -> Self {
        self.runs_per_size = runs;
        self
    }

    /// Identifier of one sweep cell, also the artifact lookup label.
    pub fn run_key(&self, n: usize, run: usize) -> String {
        format!("{}_{}_{}", self.system, n, run)
    }
}

/// Drives the sweep: split, train, score, and track, cell by cell.
pub struct SweepRunner<S, R> {
    config: SweepConfig,
    stage: S,
    store: ArtifactStore,
    rng: R,
}

impl<S: TrainingStage, R: Rng> SweepRunner<S, R> {
    pub fn new(config: SweepConfig, stage: S, store: ArtifactStore, rng: R) -> Self {
        Self {
            config,
            stage,
            store,
            rng,
        }
    }

    /// Run the full grid and return the best table.
    ///
    /// Propagates `ValidationError` immediately (whole-experiment abort,
    /// no partial report). All other failures degrade the report without
    /// stopping the sweep.
    pub fn run(&mut self, dataset: &Dataset) -> Result<BestTracker> {
        let mut tracker = BestTracker::new();
        let sizes = self.config.sizes.clone();

        for &n in &sizes {
            for run in 0..self.config.runs_per_size {
                let key = self.config.run_key(n, run);

                let split = CellSplit::draw(
                    &mut self.rng,
                    dataset.n_rows(),
                    n,
                    self.config.min_test_rows,
                )?;
                let train = dataset.select(split.train());
                let test = dataset.select(split.test());

                let folds = k_fold(&mut self.rng, train.n_rows(), self.config.n_folds)?;
                let plan = FoldAssignments::from_folds(&folds, train.n_rows());

                println!(
                    "  {} n={}, run={}",
                    "training".truecolor(120, 170, 255),
                    n,
                    run
                );

                let labels = vec![key.clone(); TRAINING_SLOTS];
                let addenda = vec![String::new(); TRAINING_SLOTS];
                match self.stage.train(&train, &labels, &addenda, &plan) {
                    Ok(_train_preds) => {}
                    Err(SweepError::TrainingDataError(msg)) => {
                        tracing::warn!(run = %key, "training rejected cell: {}", msg);
                        continue;
                    }
                    Err(e) => return Err(e),
                }

                let result = score_cell(&self.store, &key, &test);
                print_cell(&key, &result);

                for (kind, corr) in result.correlations() {
                    tracker.update(kind, corr, &key);
                }
            }
        }

        print_best(&tracker);
        Ok(tracker)
    }
}

fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

/// Per-cell correlation table.
fn print_cell(key: &str, result: &CellResult) {
    println!("  {}", key.white().bold());
    for (kind, corr) in result.correlations() {
        match corr {
            Some(c) => println!("    {:<10} {:>8.4}", muted(kind.as_str()), c),
            None => println!("    {:<10} {:>8}", muted(kind.as_str()), dim("n/a")),
        }
    }
}

/// Final best table.
fn print_best(tracker: &BestTracker) {
    println!();
    println!("  {}", "Final results".white().bold());
    println!("  {}", dim(&"─".repeat(44)));
    println!(
        "  {:<10} {:>8} {:>22}",
        muted("model"),
        muted("corr"),
        muted("run")
    );

    for (kind, entry) in tracker.entries() {
        if entry.run_key.is_empty() {
            println!(
                "  {:<10} {:>8} {:>22}",
                kind.as_str(),
                dim("—"),
                dim("no successful cell")
            );
        } else {
            println!(
                "  {:<10} {:>8.4} {:>22}",
                kind.as_str(),
                entry.corr,
                entry.run_key
            );
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::NoopStage;
    use polars::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn synthetic_dataset(n: usize) -> Dataset {
        let ids: Vec<String> = (0..n).map(|i| format!("row{}", i)).collect();
        let time: Vec<f64> = (0..n).map(|i| i as f64 * 0.3).collect();
        let f1: Vec<f64> = (0..n).map(|i| (i as f64).sqrt()).collect();
        let f2: Vec<f64> = (0..n).map(|i| (i as f64 * 0.1).cos()).collect();

        let df = df!(
            "IDENTIFIER" => ids,
            "time" => time,
            "f1" => f1,
            "f2" => f2
        )
        .unwrap();

        let names = vec!["f1".to_string(), "f2".to_string()];
        Dataset::from_frame(&df, &names).unwrap()
    }

    #[test]
    fn test_run_key_format() {
        let config = SweepConfig::new("sysA");
        assert_eq!(config.run_key(20, 3), "sysA_20_3");
    }

    #[test]
    fn test_oversized_sample_aborts_whole_experiment() {
        let dataset = synthetic_dataset(15);
        let config = SweepConfig::new("sysA").with_sizes(vec![20]);
        let store = ArtifactStore::new(std::env::temp_dir().join("rtsweep_test_sweep_abort"));
        let mut runner =
            SweepRunner::new(config, NoopStage, store, ChaCha8Rng::seed_from_u64(42));

        let err = runner.run(&dataset).unwrap_err();
        assert!(matches!(err, SweepError::ValidationError(_)));
    }

    #[test]
    fn test_small_test_side_aborts_whole_experiment() {
        let dataset = synthetic_dataset(100);
        let config = SweepConfig::new("sysA").with_sizes(vec![95]);
        let store = ArtifactStore::new(std::env::temp_dir().join("rtsweep_test_sweep_abort2"));
        let mut runner =
            SweepRunner::new(config, NoopStage, store, ChaCha8Rng::seed_from_u64(42));

        let err = runner.run(&dataset).unwrap_err();
        assert!(matches!(err, SweepError::ValidationError(_)));
    }

    #[test]
    fn test_sweep_with_no_artifacts_leaves_tracker_untouched() {
        // NoopStage persists nothing, so every kind fails to load and the
        // best table stays at its initial state.
        let dataset = synthetic_dataset(60);
        let config = SweepConfig::new("sysA")
            .with_sizes(vec![20])
            .with_runs_per_size(2);
        let store = ArtifactStore::new(std::env::temp_dir().join("rtsweep_test_sweep_noop"));
        let mut runner =
            SweepRunner::new(config, NoopStage, store, ChaCha8Rng::seed_from_u64(42));

        let tracker = runner.run(&dataset).unwrap();
        for (_, entry) in tracker.entries() {
            assert_eq!(entry.corr, -1.0);
            assert!(entry.run_key.is_empty());
        }
    }
}
