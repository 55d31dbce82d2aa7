//! Pipeline execution engine.
//!
//! Runs the five stages in order against a dataset and assembles the
//! [`PipelineResult`] with its per-stage log.

use super::encode::Encoding;
use super::impute::Imputation;
use super::outliers::OutlierRemoval;
use super::scale::Scaling;
use super::split::{Split, split_frame, test_rows};
use super::stage::{Stage, StageKind, StageRecord};
use crate::dataset::Dataset;
use crate::error::{Result, ResultExt as _};
use crate::options::PreprocessingOptions;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::time::Instant;

/// Output of one successful pipeline run. Immutable once built.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// The dataset after outlier removal, before splitting.
    pub processed: Dataset,
    pub train: DataFrame,
    pub test: DataFrame,

    /// One record per stage, in execution order.
    pub log: Vec<StageRecord>,

    pub original_shape: (usize, usize),
    pub processed_shape: (usize, usize),
    pub train_shape: (usize, usize),
    pub test_shape: (usize, usize),

    pub missing_before: usize,
    pub outliers_removed: usize,
    pub encoded_columns: Vec<String>,

    /// Whether the split used a seed.
    pub reproducible: bool,
}

impl PipelineResult {
    /// Create a summary message
    pub fn summary(&self) -> String {
        format!(
            "Pipeline completed: rows {} → {} (train {}, test {}), columns {} → {}, {} stages, {:.3}s",
            self.original_shape.0,
            self.processed_shape.0,
            self.train_shape.0,
            self.test_shape.0,
            self.original_shape.1,
            self.processed_shape.1,
            self.log.len(),
            self.log
                .iter()
                .map(|r| r.duration.as_secs_f64())
                .sum::<f64>()
        )
    }

    pub fn record(&self, stage: StageKind) -> Option<&StageRecord> {
        self.log.iter().find(|r| r.stage == stage)
    }
}

/// Run the pipeline.
///
/// Deterministic for the same dataset, options and `random_state`.
///
/// # Errors
///
/// Returns the first stage failure; no partial result is produced.
pub fn run_pipeline(dataset: &Dataset, options: &PreprocessingOptions) -> Result<PipelineResult> {
    run_pipeline_with_progress(dataset, options, |_, _| {})
}

/// Run the pipeline, calling `on_stage(completed, record)` after each stage.
///
/// `completed` counts finished stages, from 1 to [`StageKind::COUNT`].
///
/// # Errors
///
/// Returns the first stage failure; `on_stage` is not called for the failing stage.
pub fn run_pipeline_with_progress(
    dataset: &Dataset,
    options: &PreprocessingOptions,
    mut on_stage: impl FnMut(usize, &StageRecord),
) -> Result<PipelineResult> {
    let original_shape = dataset.shape();
    let missing_before = dataset.missing_count();
    tracing::info!(
        rows = original_shape.0,
        columns = original_shape.1,
        missing = missing_before,
        "Starting preprocessing pipeline"
    );

    let stages: [&dyn Stage; 4] = [
        &Imputation {
            method: options.imputation_method,
        },
        &Encoding {
            method: options.encoding_method,
        },
        &Scaling {
            method: options.scaling_method,
        },
        &OutlierRemoval {
            method: options.outlier_filter(),
        },
    ];

    let mut log = Vec::with_capacity(StageKind::COUNT);
    let mut current = dataset.clone();
    let mut encoded_columns = Vec::new();
    let mut outliers_removed = 0;

    for stage in stages {
        let (next, record, details) = run_stage(stage, current)?;
        if stage.kind() == StageKind::Encoding {
            encoded_columns = string_list(details.get("encoded_columns"));
        }
        if stage.kind() == StageKind::OutlierRemoval {
            outliers_removed = record.rows_affected;
        }
        current = next;
        log.push(record);
        if let Some(record) = log.last() {
            on_stage(log.len(), record);
        }
    }

    let (split, record) = run_split(&current, options)?;
    log.push(record);
    if let Some(record) = log.last() {
        on_stage(log.len(), record);
    }

    let result = PipelineResult {
        processed_shape: current.shape(),
        train_shape: split.train.shape(),
        test_shape: split.test.shape(),
        processed: current,
        train: split.train,
        test: split.test,
        log,
        original_shape,
        missing_before,
        outliers_removed,
        encoded_columns,
        reproducible: options.random_state.is_some(),
    };
    tracing::info!("{}", result.summary());
    Ok(result)
}

fn run_stage(
    stage: &dyn Stage,
    dataset: Dataset,
) -> Result<(Dataset, StageRecord, Map<String, Value>)> {
    let kind = stage.kind();
    let start = Instant::now();
    let (rows_before, columns_before) = dataset.shape();

    let output = stage
        .apply(dataset)
        .with_context(|| format!("{kind} stage"))?;

    let mut parameters = stage.parameters();
    parameters.extend(output.details.clone());
    let (rows_after, columns_after) = output.dataset.shape();
    let record = StageRecord {
        stage: kind,
        parameters,
        rows_before,
        rows_after,
        rows_affected: output.rows_affected,
        columns_before,
        columns_after,
        duration: start.elapsed(),
        summary: output.summary,
    };
    tracing::info!(stage = %kind, rows_affected = record.rows_affected, "{}", record.summary);
    Ok((output.dataset, record, output.details))
}

fn run_split(dataset: &Dataset, options: &PreprocessingOptions) -> Result<(Split, StageRecord)> {
    let start = Instant::now();
    let (rows, columns) = dataset.shape();
    if options.random_state.is_none() {
        tracing::warn!("No random_state given; train/test split is not reproducible");
    }

    let split = split_frame(dataset.frame(), options.test_size, options.random_state)
        .context("splitting stage")?;

    let mut parameters = Map::new();
    parameters.insert("test_size".to_owned(), Value::from(options.test_size));
    parameters.insert(
        "random_state".to_owned(),
        options.random_state.map_or(Value::Null, Value::from),
    );
    parameters.insert(
        "reproducible".to_owned(),
        Value::Bool(options.random_state.is_some()),
    );
    let record = StageRecord {
        stage: StageKind::Splitting,
        parameters,
        rows_before: rows,
        rows_after: rows,
        rows_affected: test_rows(options.test_size, rows),
        columns_before: columns,
        columns_after: columns,
        duration: start.elapsed(),
        summary: format!(
            "Split: {} train / {} test rows (test_size: {})",
            split.train.height(),
            split.test.height(),
            options.test_size
        ),
    };
    tracing::info!(stage = %StageKind::Splitting, "{}", record.summary);
    Ok((split, record))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}
