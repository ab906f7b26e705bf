//! Training stage seam and the built-in reference implementation
//!
//! The harness treats model fitting as an external collaborator: anything
//! implementing [`TrainingStage`] that persists one artifact per (run
//! label, model kind) pair into the artifact store. [`RidgeStage`] is a
//! compact reference stage so the binary runs end-to-end without external
//! tooling; a production deployment swaps in its own stage.

use crate::dataset::Table;
use crate::error::{Result, SweepError};
use crate::model::{ArtifactStore, ModelArtifact, ModelKind, Predictor};
use crate::scoring::max_abs_scale;
use crate::split::FoldAssignments;
use ndarray::{Array1, Array2, Axis};

/// Number of run labels handed to the training stage per invocation, one
/// per internal target-model slot the stage manages.
pub const TRAINING_SLOTS: usize = 8;

/// The external-training seam.
///
/// Contract: persist, as a side effect, one serialized model artifact per
/// (run label, model kind) pair; return predictions for the training set
/// (informational, unused by the driver); reject a degenerate training
/// table or fold plan with `TrainingDataError`.
pub trait TrainingStage {
    fn train(
        &self,
        table: &Table,
        run_labels: &[String],
        addenda: &[String],
        folds: &FoldAssignments,
    ) -> Result<Array1<f64>>;
}

/// Stage that trains nothing, for scoring artifacts persisted by an
/// earlier run or an external pipeline.
pub struct NoopStage;

impl TrainingStage for NoopStage {
    fn train(
        &self,
        table: &Table,
        _run_labels: &[String],
        _addenda: &[String],
        _folds: &FoldAssignments,
    ) -> Result<Array1<f64>> {
        Ok(Array1::zeros(table.n_rows()))
    }
}

/// Reference training stage: cross-validated ridge fits.
///
/// Every roster kind gets a regularization strength selected by k-fold
/// cross-validated MSE over the supplied fold plan, then a full-train fit
/// persisted under the first run label. Kinds with raw input get a linear
/// ridge (normal equations); the scaled-input kind gets an RBF kernel
/// ridge fitted on max-abs-scaled features, so its artifact expects
/// rescaled input at prediction time.
pub struct RidgeStage {
    store: ArtifactStore,
}

impl RidgeStage {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Candidate regularization strengths per kind.
    fn lambda_grid(kind: ModelKind) -> &'static [f64] {
        match kind {
            ModelKind::Lasso => &[0.001, 0.01, 0.1, 1.0],
            ModelKind::AdaBoost => &[0.1, 1.0, 10.0],
            ModelKind::Xgb => &[0.01, 0.1, 1.0, 10.0],
            ModelKind::Svm => &[0.1, 1.0, 10.0],
            ModelKind::Brr => &[1.0, 10.0, 100.0],
        }
    }

    fn fit(kind: ModelKind, x: &Array2<f64>, y: &Array1<f64>, lambda: f64) -> Result<ModelArtifact> {
        if kind.scaled_input() {
            let gamma = 1.0 / x.ncols().max(1) as f64;
            fit_kernel_ridge(x, y, lambda, gamma)
        } else {
            fit_linear_ridge(x, y, lambda)
        }
    }

    /// Mean squared error of `lambda` over the fold plan.
    fn cv_mse(
        kind: ModelKind,
        x: &Array2<f64>,
        y: &Array1<f64>,
        groups: &[Vec<usize>],
        lambda: f64,
    ) -> Result<f64> {
        let n = y.len();
        let mut total = 0.0;

        for held_out in groups {
            let fit_rows: Vec<usize> = (0..n).filter(|i| !held_out.contains(i)).collect();
            let x_fit = x.select(Axis(0), &fit_rows);
            let y_fit = y.select(Axis(0), &fit_rows);
            let x_val = x.select(Axis(0), held_out);
            let y_val = y.select(Axis(0), held_out);

            let model = Self::fit(kind, &x_fit, &y_fit, lambda)?;
            let preds = model
                .predict(&x_val)
                .map_err(|e| SweepError::TrainingDataError(format!("fold fit failed: {}", e)))?;

            total += preds
                .iter()
                .zip(y_val.iter())
                .map(|(p, t)| (p - t) * (p - t))
                .sum::<f64>();
        }

        Ok(total / n as f64)
    }
}

impl TrainingStage for RidgeStage {
    fn train(
        &self,
        table: &Table,
        run_labels: &[String],
        _addenda: &[String],
        folds: &FoldAssignments,
    ) -> Result<Array1<f64>> {
        let label = run_labels.first().ok_or_else(|| {
            SweepError::TrainingDataError("no run labels supplied".to_string())
        })?;

        if folds.len() != table.n_rows() {
            return Err(SweepError::TrainingDataError(format!(
                "fold plan covers {} rows, training table has {}",
                folds.len(),
                table.n_rows()
            )));
        }

        let groups = folds.groups();
        if groups.iter().any(|g| g.is_empty()) {
            return Err(SweepError::TrainingDataError(
                "fold plan contains an empty fold".to_string(),
            ));
        }

        let mut train_preds = Array1::zeros(table.n_rows());

        for kind in ModelKind::ALL {
            let x = if kind.scaled_input() {
                max_abs_scale(&table.features)
            } else {
                table.features.clone()
            };

            // Pick the lambda with the lowest cross-validated MSE.
            let mut best: Option<(f64, f64)> = None;
            for &lambda in Self::lambda_grid(kind) {
                let mse = Self::cv_mse(kind, &x, &table.target, &groups, lambda)?;
                if best.map_or(true, |(_, best_mse)| mse < best_mse) {
                    best = Some((lambda, mse));
                }
            }
            let (lambda, mse) = best.expect("lambda grids are non-empty");
            tracing::debug!(run = %label, model = %kind, lambda, cv_mse = mse, "selected");

            let model = Self::fit(kind, &x, &table.target, lambda)?;
            train_preds = model
                .predict(&x)
                .map_err(|e| SweepError::TrainingDataError(format!("train fit failed: {}", e)))?;
            self.store.save(label, kind, &model)?;
        }

        Ok(train_preds)
    }
}

/// Ridge regression via centered normal equations and a Cholesky solve.
fn fit_linear_ridge(x: &Array2<f64>, y: &Array1<f64>, lambda: f64) -> Result<ModelArtifact> {
    let p = x.ncols();
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| SweepError::TrainingDataError("empty training table".to_string()))?;
    let y_mean = y
        .mean()
        .ok_or_else(|| SweepError::TrainingDataError("empty training target".to_string()))?;

    let x_centered = x - &x_mean;
    let y_centered = y - y_mean;

    let mut a = x_centered.t().dot(&x_centered);
    for i in 0..p {
        a[[i, i]] += lambda;
    }
    let b = x_centered.t().dot(&y_centered);

    let w = cholesky_solve(&a, &b).ok_or_else(|| {
        SweepError::TrainingDataError("singular normal equations".to_string())
    })?;
    let intercept = y_mean - w.dot(&x_mean);

    Ok(ModelArtifact::Linear {
        coefficients: w.to_vec(),
        intercept,
    })
}

/// RBF kernel ridge: solve `(K + λI) α = y - ȳ` over the gram matrix.
fn fit_kernel_ridge(
    x: &Array2<f64>,
    y: &Array1<f64>,
    lambda: f64,
    gamma: f64,
) -> Result<ModelArtifact> {
    let n = x.nrows();
    let y_mean = y
        .mean()
        .ok_or_else(|| SweepError::TrainingDataError("empty training target".to_string()))?;

    let mut k = Array2::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let dist2: f64 = x
                .row(i)
                .iter()
                .zip(x.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            let val = (-gamma * dist2).exp();
            k[[i, j]] = val;
            k[[j, i]] = val;
        }
    }
    for i in 0..n {
        k[[i, i]] += lambda;
    }

    let b = y - y_mean;
    let alpha = cholesky_solve(&k, &b).ok_or_else(|| {
        SweepError::TrainingDataError("singular kernel system".to_string())
    })?;

    Ok(ModelArtifact::KernelRidge {
        support_vectors: x.rows().into_iter().map(|r| r.to_vec()).collect(),
        dual_coefs: alpha.to_vec(),
        intercept: y_mean,
        gamma,
    })
}

/// Solve symmetric positive-definite system Ax = b using Cholesky
/// decomposition. Falls back to a regularized solve if the matrix is
/// near-singular.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    match cholesky_solve_inner(a, b) {
        Some(x) => Some(x),
        None => {
            // Not positive definite — add a diagonal ridge and retry once.
            let mut a_reg = a.clone();
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
            for i in 0..n {
                a_reg[[i, i]] += ridge;
            }
            cholesky_solve_inner(&a_reg, b)
        }
    }
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l: Array2<f64> = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y: Array1<f64> = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x: Array1<f64> = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::{k_fold, FoldAssignments, KFoldSplit, N_FOLDS};
    use ndarray::Array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn linear_table(n: usize) -> Table {
        // y = 2*x1 - x2 + 1, noise-free.
        let features = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64 * 0.5
            } else {
                (i as f64 * 0.7).sin()
            }
        });
        let target = Array::from_iter(
            features
                .rows()
                .into_iter()
                .map(|r| 2.0 * r[0] - r[1] + 1.0),
        );
        Table {
            features,
            target,
            identifiers: (0..n).map(|i| format!("id{}", i)).collect(),
        }
    }

    fn fold_plan(n: usize) -> FoldAssignments {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let folds = k_fold(&mut rng, n, N_FOLDS).unwrap();
        FoldAssignments::from_folds(&folds, n)
    }

    fn run_labels() -> Vec<String> {
        vec!["sysA_20_0".to_string(); TRAINING_SLOTS]
    }

    fn addenda() -> Vec<String> {
        vec![String::new(); TRAINING_SLOTS]
    }

    #[test]
    fn test_ridge_stage_persists_every_kind() {
        let dir = std::env::temp_dir().join("rtsweep_test_trainer_all_kinds");
        let _ = std::fs::remove_dir_all(&dir);
        let store = ArtifactStore::new(&dir);
        let stage = RidgeStage::new(store.clone());

        let table = linear_table(30);
        stage
            .train(&table, &run_labels(), &addenda(), &fold_plan(30))
            .unwrap();

        for kind in ModelKind::ALL {
            assert!(
                store.path("sysA_20_0", kind).exists(),
                "missing artifact for {}",
                kind
            );
        }

        // The scaled-input kind gets a kernel machine; the rest are linear.
        let svm = store.load("sysA_20_0", ModelKind::Svm).unwrap();
        assert!(matches!(svm, ModelArtifact::KernelRidge { .. }));
        let lasso = store.load("sysA_20_0", ModelKind::Lasso).unwrap();
        assert!(matches!(lasso, ModelArtifact::Linear { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_ridge_stage_recovers_linear_relationship() {
        let dir = std::env::temp_dir().join("rtsweep_test_trainer_recover");
        let _ = std::fs::remove_dir_all(&dir);
        let store = ArtifactStore::new(&dir);
        let stage = RidgeStage::new(store.clone());

        let table = linear_table(40);
        stage
            .train(&table, &run_labels(), &addenda(), &fold_plan(40))
            .unwrap();

        let model = store.load("sysA_20_0", ModelKind::Lasso).unwrap();
        let preds = model.predict(&table.features).unwrap();
        for (p, t) in preds.iter().zip(table.target.iter()) {
            assert!((p - t).abs() < 1e-3, "prediction {} far from target {}", p, t);
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_fold_is_training_data_error() {
        let dir = std::env::temp_dir().join("rtsweep_test_trainer_empty_fold");
        let _ = std::fs::remove_dir_all(&dir);
        let stage = RidgeStage::new(ArtifactStore::new(&dir));

        // Two folds, one of which holds nothing out.
        let folds = vec![
            KFoldSplit {
                train_indices: vec![],
                held_out: (0..12).collect(),
                fold_idx: 0,
            },
            KFoldSplit {
                train_indices: (0..12).collect(),
                held_out: vec![],
                fold_idx: 1,
            },
        ];
        let plan = FoldAssignments::from_folds(&folds, 12);

        let err = stage
            .train(&linear_table(12), &run_labels(), &addenda(), &plan)
            .unwrap_err();
        assert!(matches!(err, SweepError::TrainingDataError(_)));
    }

    #[test]
    fn test_fold_plan_length_mismatch_is_training_data_error() {
        let dir = std::env::temp_dir().join("rtsweep_test_trainer_mismatch");
        let _ = std::fs::remove_dir_all(&dir);
        let stage = RidgeStage::new(ArtifactStore::new(&dir));

        let err = stage
            .train(&linear_table(30), &run_labels(), &addenda(), &fold_plan(20))
            .unwrap_err();
        assert!(matches!(err, SweepError::TrainingDataError(_)));
    }

    #[test]
    fn test_noop_stage_persists_nothing() {
        let dir = std::env::temp_dir().join("rtsweep_test_trainer_noop");
        let _ = std::fs::remove_dir_all(&dir);
        let store = ArtifactStore::new(&dir);

        let table = linear_table(20);
        let preds = NoopStage
            .train(&table, &run_labels(), &addenda(), &fold_plan(20))
            .unwrap();

        assert_eq!(preds.len(), 20);
        assert!(preds.iter().all(|&p| p == 0.0));
        for kind in ModelKind::ALL {
            assert!(!store.path("sysA_20_0", kind).exists());
        }
    }

    #[test]
    fn test_cholesky_solves_spd_system() {
        let a = ndarray::array![[4.0, 2.0], [2.0, 3.0]];
        let b = ndarray::array![2.0, 5.0];
        let x = cholesky_solve(&a, &b).unwrap();

        // Verify A x = b.
        let ax = a.dot(&x);
        assert!((ax[0] - b[0]).abs() < 1e-10);
        assert!((ax[1] - b[1]).abs() < 1e-10);
    }
}
