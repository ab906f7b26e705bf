//! Model roster, predictor interface, and persisted artifacts
//!
//! The roster is a closed set of five regression model kinds. Trained
//! models are opaque to the harness: whatever stage produced them, scoring
//! only relies on the single `predict` capability, loaded from a
//! JSON-serialized artifact keyed by run label and model kind.

use crate::error::{Result, SweepError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// The fixed roster of regression model kinds evaluated in every cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Lasso,
    AdaBoost,
    Xgb,
    Svm,
    Brr,
}

impl ModelKind {
    /// Roster in fixed evaluation order.
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Lasso,
        ModelKind::AdaBoost,
        ModelKind::Xgb,
        ModelKind::Svm,
        ModelKind::Brr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Lasso => "lasso",
            ModelKind::AdaBoost => "adaboost",
            ModelKind::Xgb => "xgb",
            ModelKind::Svm => "svm",
            ModelKind::Brr => "brr",
        }
    }

    /// Whether artifacts of this kind expect max-abs-scaled input.
    ///
    /// The SVM-family models are trained on rescaled features, so scoring
    /// must rescale the prediction matrix the same way. All other kinds
    /// predict on raw features.
    pub fn scaled_input(&self) -> bool {
        matches!(self, ModelKind::Svm)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trained predictor: the single capability the scoring stage relies on.
pub trait Predictor {
    /// Predict one value per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// On-disk representation of a trained predictor.
///
/// Variants are prediction-sufficient parameter sets; the training stage
/// decides which representation each roster kind gets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Linear predictor: `y = x · coefficients + intercept`.
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    /// RBF kernel machine: `y = Σ α_j exp(-γ ||x - sv_j||²) + intercept`.
    KernelRidge {
        support_vectors: Vec<Vec<f64>>,
        dual_coefs: Vec<f64>,
        intercept: f64,
        gamma: f64,
    },
}

impl Predictor for ModelArtifact {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let preds = match self {
            ModelArtifact::Linear {
                coefficients,
                intercept,
            } => {
                if x.ncols() != coefficients.len() {
                    return Err(SweepError::PredictionError(format!(
                        "feature count mismatch: got {}, model expects {}",
                        x.ncols(),
                        coefficients.len()
                    )));
                }
                x.rows()
                    .into_iter()
                    .map(|row| {
                        row.iter()
                            .zip(coefficients.iter())
                            .map(|(v, c)| v * c)
                            .sum::<f64>()
                            + intercept
                    })
                    .collect::<Array1<f64>>()
            }
            ModelArtifact::KernelRidge {
                support_vectors,
                dual_coefs,
                intercept,
                gamma,
            } => {
                let n_features = support_vectors.first().map(|sv| sv.len()).unwrap_or(0);
                if x.ncols() != n_features {
                    return Err(SweepError::PredictionError(format!(
                        "feature count mismatch: got {}, model expects {}",
                        x.ncols(),
                        n_features
                    )));
                }
                if support_vectors.len() != dual_coefs.len() {
                    return Err(SweepError::PredictionError(
                        "support vector / dual coefficient count mismatch".to_string(),
                    ));
                }
                x.rows()
                    .into_iter()
                    .map(|row| {
                        let mut acc = *intercept;
                        for (sv, alpha) in support_vectors.iter().zip(dual_coefs.iter()) {
                            let dist2: f64 = row
                                .iter()
                                .zip(sv.iter())
                                .map(|(a, b)| (a - b) * (a - b))
                                .sum();
                            acc += alpha * (-gamma * dist2).exp();
                        }
                        acc
                    })
                    .collect::<Array1<f64>>()
            }
        };

        if preds.iter().any(|v| !v.is_finite()) {
            return Err(SweepError::PredictionError(
                "non-finite prediction".to_string(),
            ));
        }

        Ok(preds)
    }
}

/// Filesystem store for model artifacts, keyed by run label and kind.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Well-known artifact location for a (run label, model kind) pair.
    pub fn path(&self, label: &str, kind: ModelKind) -> PathBuf {
        self.base_dir.join(format!("{}_{}.json", label, kind))
    }

    pub fn save(&self, label: &str, kind: ModelKind, artifact: &ModelArtifact) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(self.path(label, kind), json)?;
        Ok(())
    }

    /// Load the artifact for a (run label, model kind) pair.
    ///
    /// Missing or undeserializable files surface as `ArtifactError` so the
    /// scoring stage can skip just this kind.
    pub fn load(&self, label: &str, kind: ModelKind) -> Result<ModelArtifact> {
        let path = self.path(label, kind);
        let json = fs::read_to_string(&path)
            .map_err(|e| SweepError::ArtifactError(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| SweepError::ArtifactError(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roster_names() {
        let names: Vec<&str> = ModelKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["lasso", "adaboost", "xgb", "svm", "brr"]);
    }

    #[test]
    fn test_only_svm_wants_scaled_input() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.scaled_input(), kind == ModelKind::Svm);
        }
    }

    #[test]
    fn test_linear_predict() {
        let model = ModelArtifact::Linear {
            coefficients: vec![2.0, -1.0],
            intercept: 0.5,
        };
        let x = array![[1.0, 1.0], [0.0, 3.0]];
        let preds = model.predict(&x).unwrap();
        assert!((preds[0] - 1.5).abs() < 1e-12);
        assert!((preds[1] + 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_linear_predict_shape_mismatch() {
        let model = ModelArtifact::Linear {
            coefficients: vec![2.0, -1.0],
            intercept: 0.0,
        };
        let x = array![[1.0, 1.0, 1.0]];
        let err = model.predict(&x).unwrap_err();
        assert!(matches!(err, SweepError::PredictionError(_)));
    }

    #[test]
    fn test_kernel_ridge_predict_at_support_vector() {
        // At a support vector the kernel term is exactly alpha.
        let model = ModelArtifact::KernelRidge {
            support_vectors: vec![vec![1.0, 2.0]],
            dual_coefs: vec![3.0],
            intercept: 1.0,
            gamma: 0.5,
        };
        let x = array![[1.0, 2.0]];
        let preds = model.predict(&x).unwrap();
        assert!((preds[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_store_round_trip() {
        let dir = std::env::temp_dir().join("rtsweep_test_store");
        let store = ArtifactStore::new(&dir);

        let artifact = ModelArtifact::Linear {
            coefficients: vec![1.0, 2.0],
            intercept: -0.25,
        };
        store.save("sysA_20_0", ModelKind::Lasso, &artifact).unwrap();

        let loaded = store.load("sysA_20_0", ModelKind::Lasso).unwrap();
        match loaded {
            ModelArtifact::Linear {
                coefficients,
                intercept,
            } => {
                assert_eq!(coefficients, vec![1.0, 2.0]);
                assert!((intercept + 0.25).abs() < 1e-12);
            }
            _ => panic!("wrong artifact variant"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_store_missing_artifact_is_artifact_error() {
        let store = ArtifactStore::new(std::env::temp_dir().join("rtsweep_test_missing"));
        let err = store.load("nope_20_0", ModelKind::Brr).unwrap_err();
        assert!(matches!(err, SweepError::ArtifactError(_)));
    }

    #[test]
    fn test_store_corrupt_artifact_is_artifact_error() {
        let dir = std::env::temp_dir().join("rtsweep_test_corrupt");
        let store = ArtifactStore::new(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path("k", ModelKind::Xgb), b"not json").unwrap();

        let err = store.load("k", ModelKind::Xgb).unwrap_err();
        assert!(matches!(err, SweepError::ArtifactError(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
