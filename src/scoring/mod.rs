//! Per-cell scoring of persisted models against the held-out split
//!
//! For each roster kind: load the artifact for the cell's run key, apply
//! the kind-specific input scaling, predict on the test features, and
//! collect the predictions next to the true target. Load and prediction
//! failures skip just that kind; the cell keeps scoring the rest.

use crate::dataset::Table;
use crate::model::{ArtifactStore, ModelKind, Predictor};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Predictions for one sweep cell, aligned to the test rows: the true
/// target plus one column per model kind that scored successfully.
#[derive(Debug, Clone)]
pub struct CellResult {
    pub target: Array1<f64>,
    pub predictions: Vec<(ModelKind, Array1<f64>)>,
}

impl CellResult {
    pub fn prediction(&self, kind: ModelKind) -> Option<&Array1<f64>> {
        self.predictions
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p)
    }

    /// Pearson correlation of each prediction column against the target,
    /// in roster order. Kinds without a column, or with an undefined
    /// correlation, map to `None`.
    pub fn correlations(&self) -> Vec<(ModelKind, Option<f64>)> {
        ModelKind::ALL
            .iter()
            .map(|&kind| {
                let corr = self
                    .prediction(kind)
                    .and_then(|p| pearson(p.view(), self.target.view()));
                (kind, corr)
            })
            .collect()
    }
}

/// Scale each feature column by its maximum absolute value observed in
/// that same matrix. Columns of zeros pass through unchanged.
pub fn max_abs_scale(x: &Array2<f64>) -> Array2<f64> {
    let mut scaled = x.clone();
    for mut col in scaled.axis_iter_mut(Axis(1)) {
        let max_abs = col.iter().fold(0.0f64, |a, v| a.max(v.abs()));
        if max_abs > 0.0 {
            col.mapv_inplace(|v| v / max_abs);
        }
    }
    scaled
}

/// Pearson correlation coefficient.
///
/// Returns `None` when the correlation is undefined: fewer than two
/// samples, zero variance on either side, or non-finite inputs. An
/// undefined correlation is "not comparable", never a stand-in value.
pub fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }

    let x_mean = x.mean().unwrap_or(0.0);
    let y_mean = y.mean().unwrap_or(0.0);

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;

    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 {
        return None;
    }

    let r = sum_xy / denom;
    r.is_finite().then_some(r)
}

/// Score every roster kind for one cell against the held-out table.
///
/// The prediction input is the test feature matrix (target and identifier
/// are not part of it), max-abs-rescaled for kinds whose artifacts were
/// trained on rescaled features.
pub fn score_cell(store: &ArtifactStore, run_key: &str, test: &Table) -> CellResult {
    let mut result = CellResult {
        target: test.target.clone(),
        predictions: Vec::new(),
    };

    for kind in ModelKind::ALL {
        let artifact = match store.load(run_key, kind) {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(run = %run_key, model = %kind, "skipping model: {}", e);
                continue;
            }
        };

        let x = if kind.scaled_input() {
            max_abs_scale(&test.features)
        } else {
            test.features.clone()
        };

        match artifact.predict(&x) {
            Ok(preds) => result.predictions.push((kind, preds)),
            Err(e) => {
                tracing::warn!(run = %run_key, model = %kind, "prediction failed: {}", e);
            }
        }
    }

    result
}
