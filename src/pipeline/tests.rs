#![expect(clippy::unwrap_used)]
use super::stats;
use super::*;
use crate::dataset::{ColumnKind, Dataset};
use crate::error::ErrorCategory;
use crate::options::{
    EncodingMethod, ImputationMethod, OutlierMethod, PreprocessingOptions, ScalingMethod,
};
use anyhow::Result;
use polars::prelude::*;

/// 100 rows: two numeric columns with gaps, one categorical with three values.
fn scenario_dataset() -> Result<Dataset> {
    let income: Vec<Option<f64>> = (0..100)
        .map(|i| (i % 7 != 3).then(|| 1000.0 + f64::from(i) * 12.5))
        .collect();
    let age: Vec<Option<i64>> = (0..100)
        .map(|i| (i % 11 != 5).then_some(18 + (i * 7) % 50))
        .collect();
    let region: Vec<&str> = (0..100)
        .map(|i| ["north", "south", "east"][i % 3])
        .collect();
    let df = DataFrame::new(vec![
        Column::from(Series::new("income".into(), income)),
        Column::from(Series::new("age".into(), age)),
        Column::from(Series::new("region".into(), region)),
    ])?;
    Ok(Dataset::new(df)?)
}

fn seeded(seed: u64) -> PreprocessingOptions {
    PreprocessingOptions {
        random_state: Some(seed),
        ..Default::default()
    }
}

fn values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    stats::float_values(df.column(name).unwrap()).unwrap()
}

#[test]
fn test_scenario_defaults_with_seed() -> Result<()> {
    let dataset = scenario_dataset()?;
    let result = run_pipeline(&dataset, &seeded(42))?;

    assert_eq!(result.processed.numeric_missing_count(), 0);
    assert_eq!(
        result.encoded_columns,
        vec!["region_north", "region_south", "region_east"]
    );
    assert_eq!(result.processed.width(), 5);
    assert!(result.processed.kind_of("region").is_none());

    for name in ["income", "age"] {
        let col: Vec<f64> = values(result.processed.frame(), name)
            .into_iter()
            .flatten()
            .collect();
        assert!(col.iter().all(|v| (0.0..=1.0).contains(v)), "{name} out of range");
    }

    assert_eq!(result.train.height(), 80);
    assert_eq!(result.test.height(), 20);
    assert_eq!(result.log.len(), StageKind::COUNT);
    assert!(result.reproducible);
    Ok(())
}

#[test]
fn test_log_covers_every_stage_in_order() -> Result<()> {
    let result = run_pipeline(&scenario_dataset()?, &seeded(1))?;
    let stages: Vec<StageKind> = result.log.iter().map(|r| r.stage).collect();
    assert_eq!(stages, StageKind::ALL.to_vec());

    let impute = result.record(StageKind::Imputation).unwrap();
    assert!(impute.summary.starts_with("Missing values:"), "{}", impute.summary);
    assert_eq!(impute.parameters["method"], "mean");

    let outliers = result.record(StageKind::OutlierRemoval).unwrap();
    assert_eq!(outliers.rows_affected, 0);
    assert_eq!(outliers.rows_before, outliers.rows_after);
    Ok(())
}

#[test]
fn test_same_seed_gives_identical_split() -> Result<()> {
    let dataset = scenario_dataset()?;
    let a = run_pipeline(&dataset, &seeded(42))?;
    let b = run_pipeline(&dataset, &seeded(42))?;
    assert!(a.train.equals_missing(&b.train));
    assert!(a.test.equals_missing(&b.test));
    Ok(())
}

#[test]
fn test_unseeded_split_still_partitions() -> Result<()> {
    let dataset = scenario_dataset()?;
    let result = run_pipeline(&dataset, &PreprocessingOptions::default())?;
    assert!(!result.reproducible);
    assert_eq!(result.train.height() + result.test.height(), dataset.height());
    Ok(())
}

#[test]
fn test_every_fill_method_removes_numeric_gaps() -> Result<()> {
    let dataset = scenario_dataset()?;
    let imputations = [
        ImputationMethod::Median,
        ImputationMethod::Mode,
        ImputationMethod::Drop,
    ];
    let scalings = [
        ScalingMethod::None,
        ScalingMethod::MinMax,
        ScalingMethod::Standard,
        ScalingMethod::Robust,
    ];
    let encodings = [EncodingMethod::None, EncodingMethod::OneHot, EncodingMethod::Label];

    for imputation_method in imputations {
        for scaling_method in scalings {
            for encoding_method in encodings {
                let options = PreprocessingOptions {
                    imputation_method,
                    scaling_method,
                    encoding_method,
                    random_state: Some(3),
                    ..Default::default()
                };
                let result = run_pipeline(&dataset, &options)?;
                assert_eq!(
                    result.processed.numeric_missing_count(),
                    0,
                    "{imputation_method}/{scaling_method}/{encoding_method}"
                );
                assert_eq!(
                    result.train.height() + result.test.height(),
                    result.processed.height()
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_nan_is_imputed_before_scaling() -> Result<()> {
    let df = DataFrame::new(vec![Column::from(Series::new(
        "x".into(),
        vec![1.0, 2.0, f64::NAN, 4.0, 5.0],
    ))])?;
    let dataset = Dataset::new(df)?;

    let result = run_pipeline(&dataset, &seeded(4))?;
    let impute = result.record(StageKind::Imputation).unwrap();
    assert_eq!(impute.summary, "Missing values: 1 -> 0 (method: mean)");
    let x: Vec<f64> = values(result.processed.frame(), "x")
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(x, vec![0.0, 0.25, 0.5, 0.75, 1.0]);

    let standard = PreprocessingOptions {
        scaling_method: ScalingMethod::Standard,
        ..seeded(4)
    };
    let result = run_pipeline(&dataset, &standard)?;
    let x = values(result.processed.frame(), "x");
    assert!(x.iter().all(|v| v.is_some_and(f64::is_finite)), "{x:?}");
    Ok(())
}

#[test]
fn test_mean_imputation_with_categorical_gap_fails() -> Result<()> {
    let df = DataFrame::new(vec![
        Column::from(Series::new("x".into(), vec![Some(1.0), Some(2.0), None])),
        Column::from(Series::new("c".into(), vec![Some("a"), None, Some("b")])),
    ])?;
    let err = run_pipeline(&Dataset::new(df)?, &seeded(0)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::UnsupportedOperation);
    Ok(())
}

#[test]
fn test_standard_scaling_properties() -> Result<()> {
    let options = PreprocessingOptions {
        scaling_method: ScalingMethod::Standard,
        random_state: Some(9),
        ..Default::default()
    };
    let result = run_pipeline(&scenario_dataset()?, &options)?;
    for name in ["income", "age"] {
        let col: Vec<f64> = values(result.processed.frame(), name)
            .into_iter()
            .flatten()
            .collect();
        assert!(stats::mean(&col).unwrap().abs() < 1e-9);
        assert!((stats::population_std(&col).unwrap() - 1.0).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn test_outliers_use_scaled_values() -> Result<()> {
    let mut x: Vec<f64> = (0..30).map(f64::from).collect();
    x.push(500.0);
    let df = DataFrame::new(vec![Column::from(Series::new("x".into(), x))])?;
    let options = PreprocessingOptions {
        scaling_method: ScalingMethod::MinMax,
        remove_outliers: true,
        outlier_method: OutlierMethod::Iqr,
        random_state: Some(5),
        ..Default::default()
    };
    let result = run_pipeline(&Dataset::new(df)?, &options)?;
    assert_eq!(result.outliers_removed, 1);
    assert_eq!(result.processed.height(), 30);

    // Bounds were fitted after scaling, so they are on the [0, 1] scale.
    let outliers = result.record(StageKind::OutlierRemoval).unwrap();
    let upper = outliers.parameters["columns"]["x"]["upper"].as_f64().unwrap();
    assert!(upper < 1.0);
    Ok(())
}

#[test]
fn test_progress_callback_counts_stages() -> Result<()> {
    let mut seen = Vec::new();
    run_pipeline_with_progress(&scenario_dataset()?, &seeded(2), |done, record| {
        seen.push((done, record.stage));
    })?;
    let expected: Vec<(usize, StageKind)> = StageKind::ALL
        .into_iter()
        .enumerate()
        .map(|(i, k)| (i + 1, k))
        .collect();
    assert_eq!(seen, expected);
    Ok(())
}

#[test]
fn test_encoding_none_keeps_categorical_through_scaling() -> Result<()> {
    let options = PreprocessingOptions {
        encoding_method: EncodingMethod::None,
        random_state: Some(4),
        ..Default::default()
    };
    let result = run_pipeline(&scenario_dataset()?, &options)?;
    assert_eq!(
        result.processed.kind_of("region"),
        Some(ColumnKind::Categorical)
    );
    assert!(result.encoded_columns.is_empty());
    Ok(())
}
