//! Row-wise outlier removal over numeric columns.
//!
//! Runs after scaling, so bounds are computed on the scaled representation. Every
//! column's bounds are fitted on the same input before any row is dropped.

use super::stage::{Stage, StageKind, StageOutput};
use super::stats;
use crate::dataset::{ColumnKind, Dataset};
use crate::error::Result;
use crate::options::{Choice as _, OutlierMethod};
use polars::prelude::*;
use serde_json::{Map, Value, json};

pub const IQR_FACTOR: f64 = 1.5;
pub const Z_THRESHOLD: f64 = 3.0;

/// `method` is `None` when outlier removal is switched off.
#[derive(Debug, Clone, Copy)]
pub struct OutlierRemoval {
    pub method: Option<OutlierMethod>,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    /// Inclusive `[lower, upper]`.
    Bounds { lower: f64, upper: f64 },
    ZScore { mean: f64, std: f64 },
    /// Degenerate column that never flags.
    Never,
}

impl Rule {
    fn fit(method: OutlierMethod, sorted: &[f64]) -> Self {
        match method {
            OutlierMethod::Iqr => match stats::quartiles(sorted) {
                Some((q1, q3)) => {
                    let iqr = q3 - q1;
                    Self::Bounds {
                        lower: q1 - IQR_FACTOR * iqr,
                        upper: q3 + IQR_FACTOR * iqr,
                    }
                }
                None => Self::Never,
            },
            OutlierMethod::ZScore => match (stats::mean(sorted), stats::population_std(sorted)) {
                (Some(mean), Some(std)) if std > 0.0 => Self::ZScore { mean, std },
                _ => Self::Never,
            },
        }
    }

    fn flags(self, x: f64) -> bool {
        match self {
            Self::Bounds { lower, upper } => x < lower || x > upper,
            Self::ZScore { mean, std } => ((x - mean) / std).abs() > Z_THRESHOLD,
            Self::Never => false,
        }
    }

    fn describe(self) -> Value {
        match self {
            Self::Bounds { lower, upper } => json!({ "lower": lower, "upper": upper }),
            Self::ZScore { mean, std } => json!({ "mean": mean, "std": std }),
            Self::Never => Value::Null,
        }
    }
}

impl Stage for OutlierRemoval {
    fn kind(&self) -> StageKind {
        StageKind::OutlierRemoval
    }

    fn parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("enabled".to_owned(), Value::Bool(self.method.is_some()));
        if let Some(method) = self.method {
            params.insert("method".to_owned(), method.as_str().into());
        }
        params
    }

    fn apply(&self, dataset: Dataset) -> Result<StageOutput> {
        let Some(method) = self.method else {
            return Ok(StageOutput::unchanged(dataset, "Outlier removal disabled"));
        };

        let mut keep = vec![true; dataset.height()];
        let mut fitted = Map::new();
        for (col, kind) in dataset.columns() {
            if kind != ColumnKind::Numeric {
                continue;
            }
            let values = stats::float_values(col)?;
            let rule = Rule::fit(method, &stats::present_sorted(&values));
            fitted.insert(col.name().to_string(), rule.describe());
            for (k, v) in keep.iter_mut().zip(&values) {
                if v.is_some_and(|x| rule.flags(x)) {
                    *k = false;
                }
            }
        }

        let removed = keep.iter().filter(|k| !**k).count();
        let (frame, kinds) = dataset.into_parts();
        let frame = if removed > 0 {
            frame.filter(&BooleanChunked::from_slice("keep".into(), &keep))?
        } else {
            frame
        };
        tracing::debug!(%method, removed, "Outlier removal applied");

        let mut details = Map::new();
        details.insert("columns".to_owned(), Value::Object(fitted));
        Ok(StageOutput {
            dataset: Dataset::from_parts(frame, kinds)?,
            rows_affected: removed,
            summary: format!("Outliers removed: {removed} rows (method: {method})"),
            details,
        })
    }
}
