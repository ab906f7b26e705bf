//! Best-of tracking across the sweep
//!
//! One entry per roster kind: the highest correlation observed so far and
//! the run key that achieved it. Undefined correlations never touch the
//! table; entries are never removed or lowered.

use crate::model::ModelKind;
use std::collections::HashMap;

/// Best correlation seen for one model kind, and where it came from.
#[derive(Debug, Clone)]
pub struct BestEntry {
    pub corr: f64,
    pub run_key: String,
}

/// Per-kind record of the best-scoring sweep cell.
#[derive(Debug, Clone)]
pub struct BestTracker {
    entries: HashMap<ModelKind, BestEntry>,
}

impl BestTracker {
    /// Initialize every roster kind below any valid correlation.
    pub fn new() -> Self {
        let entries = ModelKind::ALL
            .iter()
            .map(|&kind| {
                (
                    kind,
                    BestEntry {
                        corr: -1.0,
                        run_key: String::new(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Record a cell's correlation for one kind if it strictly improves
    /// on the stored best. `None` or NaN means "not comparable": log and
    /// leave the entry unchanged.
    pub fn update(&mut self, kind: ModelKind, corr: Option<f64>, run_key: &str) {
        let corr = match corr {
            Some(c) if c.is_nan() => {
                tracing::warn!(run = %run_key, model = %kind, "correlation undefined, keeping best");
                return;
            }
            Some(c) => c,
            None => {
                tracing::warn!(run = %run_key, model = %kind, "no comparable correlation, keeping best");
                return;
            }
        };

        if let Some(entry) = self.entries.get_mut(&kind) {
            if corr > entry.corr {
                entry.corr = corr;
                entry.run_key = run_key.to_string();
            }
        }
    }

    pub fn entry(&self, kind: ModelKind) -> &BestEntry {
        &self.entries[&kind]
    }

    /// Entries in roster order.
    pub fn entries(&self) -> impl Iterator<Item = (ModelKind, &BestEntry)> + '_ {
        ModelKind::ALL
            .into_iter()
            .map(move |kind| (kind, &self.entries[&kind]))
    }
}

impl Default for BestTracker {
    fn default() -> Self {
        Self::new()
    }
}
