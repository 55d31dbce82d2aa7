//! Per-column scaling of numeric columns. Non-numeric columns are skipped.

use super::stage::{Stage, StageKind, StageOutput};
use super::stats;
use crate::dataset::{ColumnKind, Dataset};
use crate::error::Result;
use crate::options::{Choice as _, ScalingMethod};
use polars::prelude::*;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy)]
pub struct Scaling {
    pub method: ScalingMethod,
}

/// `(x - center) / scale`, or the constant/identity fallback for degenerate columns.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Transform {
    Affine { center: f64, scale: f64 },
    Constant(f64),
    Identity,
}

impl Transform {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Affine { center, scale } => (x - center) / scale,
            Self::Constant(c) => c,
            Self::Identity => x,
        }
    }

    fn describe(self) -> Value {
        match self {
            Self::Affine { center, scale } => json!({ "center": center, "scale": scale }),
            Self::Constant(c) => json!({ "constant": c }),
            Self::Identity => json!("unscaled"),
        }
    }
}

fn fit(method: ScalingMethod, sorted: &[f64]) -> Transform {
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Transform::Identity;
    };
    match method {
        ScalingMethod::None => Transform::Identity,
        ScalingMethod::MinMax => {
            let range = last - first;
            if range > 0.0 {
                Transform::Affine {
                    center: *first,
                    scale: range,
                }
            } else {
                Transform::Constant(0.0)
            }
        }
        ScalingMethod::Standard => match (stats::mean(sorted), stats::population_std(sorted)) {
            (Some(center), Some(scale)) if scale > 0.0 => Transform::Affine { center, scale },
            _ => Transform::Identity,
        },
        ScalingMethod::Robust => match (stats::median(sorted), stats::quartiles(sorted)) {
            (Some(center), Some((q1, q3))) if q3 - q1 > 0.0 => Transform::Affine {
                center,
                scale: q3 - q1,
            },
            _ => Transform::Identity,
        },
    }
}

impl Stage for Scaling {
    fn kind(&self) -> StageKind {
        StageKind::Scaling
    }

    fn parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("method".to_owned(), self.method.as_str().into());
        params
    }

    fn apply(&self, dataset: Dataset) -> Result<StageOutput> {
        let numeric = dataset
            .kinds()
            .iter()
            .filter(|k| **k == ColumnKind::Numeric)
            .count();
        if self.method == ScalingMethod::None || numeric == 0 {
            return Ok(StageOutput::unchanged(
                dataset,
                format!("Scaled 0 numeric columns (method: {})", self.method),
            ));
        }

        let height = dataset.height();
        let mut fitted = Map::new();
        let mut columns = Vec::with_capacity(dataset.width());
        for (col, kind) in dataset.columns() {
            if kind != ColumnKind::Numeric {
                columns.push(col.clone());
                continue;
            }
            let values = stats::float_values(col)?;
            let transform = fit(self.method, &stats::present_sorted(&values));
            tracing::debug!(column = %col.name(), ?transform, "Scaling column");
            fitted.insert(col.name().to_string(), transform.describe());
            let scaled = values.into_iter().map(|v| v.map(|x| transform.apply(x))).collect();
            columns.push(stats::float_column(col.name(), scaled));
        }

        let frame = DataFrame::new(columns)?;
        let dataset = Dataset::from_parts(frame, dataset.kinds().to_vec())?;
        let mut details = Map::new();
        details.insert("columns".to_owned(), Value::Object(fitted));
        Ok(StageOutput {
            summary: format!("Scaled {numeric} numeric columns (method: {})", self.method),
            dataset,
            rows_affected: height,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;

    fn sample() -> Dataset {
        let frame = DataFrame::new(vec![
            Column::from(Series::new("a".into(), vec![2.0, 4.0, 6.0, 10.0])),
            Column::from(Series::new("flat".into(), vec![3i64, 3, 3, 3])),
            Column::from(Series::new("c".into(), vec!["p", "q", "p", "q"])),
        ])
        .unwrap();
        Dataset::new(frame).unwrap()
    }

    fn scale(method: ScalingMethod, dataset: Dataset) -> Result<StageOutput> {
        Scaling { method }.apply(dataset)
    }

    fn column(ds: &Dataset, name: &str) -> Vec<f64> {
        stats::float_values(ds.frame().column(name).unwrap())
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn test_minmax_bounds_exact() {
        let out = scale(ScalingMethod::MinMax, sample()).unwrap();
        let a = column(&out.dataset, "a");
        assert_eq!(a.iter().copied().fold(f64::INFINITY, f64::min), 0.0);
        assert_eq!(a.iter().copied().fold(f64::NEG_INFINITY, f64::max), 1.0);
        assert_eq!(column(&out.dataset, "flat"), vec![0.0; 4]);
    }

    #[test]
    fn test_standard_zero_mean_unit_std() {
        let out = scale(ScalingMethod::Standard, sample()).unwrap();
        let a = column(&out.dataset, "a");
        assert!(stats::mean(&a).unwrap().abs() < 1e-12);
        assert!((stats::population_std(&a).unwrap() - 1.0).abs() < 1e-12);
        // Zero variance is left unscaled.
        assert_eq!(column(&out.dataset, "flat"), vec![3.0; 4]);
    }

    #[test]
    fn test_robust_centers_on_median() {
        let out = scale(ScalingMethod::Robust, sample()).unwrap();
        let a = column(&out.dataset, "a");
        // median 5, Q1 3.5, Q3 7
        assert!((a[0] - (2.0 - 5.0) / 3.5).abs() < 1e-12);
        assert_eq!(column(&out.dataset, "flat"), vec![3.0; 4]);
    }

    #[test]
    fn test_categorical_columns_are_skipped() {
        let out = scale(ScalingMethod::MinMax, sample()).unwrap();
        assert_eq!(out.dataset.kind_of("c"), Some(ColumnKind::Categorical));
        assert_eq!(
            out.dataset.frame().column("c").unwrap().dtype(),
            &DataType::String
        );
    }
}
