//! Missing-value imputation.

use super::stage::{Stage, StageKind, StageOutput};
use super::stats;
use crate::dataset::{ColumnKind, Dataset};
use crate::error::{FlowprepError, Result};
use crate::options::{Choice as _, ImputationMethod};
use polars::prelude::*;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy)]
pub struct Imputation {
    pub method: ImputationMethod,
}

impl Stage for Imputation {
    fn kind(&self) -> StageKind {
        StageKind::Imputation
    }

    fn parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("method".to_owned(), self.method.as_str().into());
        params
    }

    fn apply(&self, dataset: Dataset) -> Result<StageOutput> {
        let missing_before = dataset.missing_count();
        let incomplete_rows = incomplete_row_mask(dataset.frame())
            .iter()
            .filter(|complete| !**complete)
            .count();

        if missing_before == 0 {
            return Ok(StageOutput::unchanged(
                dataset,
                format!("Missing values: 0 -> 0 (method: {})", self.method),
            ));
        }

        let (dataset, details) = match self.method {
            ImputationMethod::Drop => (drop_incomplete_rows(dataset)?, Map::new()),
            method => fill_columns(dataset, method)?,
        };

        let missing_after = dataset.missing_count();
        tracing::debug!(
            method = %self.method,
            missing_before,
            missing_after,
            incomplete_rows,
            "Imputation applied"
        );
        Ok(StageOutput {
            summary: format!(
                "Missing values: {missing_before} -> {missing_after} (method: {})",
                self.method
            ),
            dataset,
            rows_affected: incomplete_rows,
            details,
        })
    }
}

/// `true` for every row without a missing value.
fn incomplete_row_mask(frame: &DataFrame) -> Vec<bool> {
    let mut complete = vec![true; frame.height()];
    for col in frame.get_columns() {
        if col.null_count() == 0 {
            continue;
        }
        let valid = col.as_materialized_series().is_not_null();
        for (keep, is_valid) in complete.iter_mut().zip(valid.into_iter()) {
            if is_valid != Some(true) {
                *keep = false;
            }
        }
    }
    complete
}

fn is_entirely_missing(col: &Column) -> bool {
    col.len() > 0 && col.null_count() == col.len()
}

fn drop_incomplete_rows(dataset: Dataset) -> Result<Dataset> {
    if let Some(col) = dataset
        .frame()
        .get_columns()
        .iter()
        .find(|c| is_entirely_missing(c))
    {
        return Err(FlowprepError::unsupported(
            col.name().as_str(),
            ImputationMethod::Drop.as_str(),
            "column is entirely missing, dropping would remove every row",
        ));
    }

    let mask = incomplete_row_mask(dataset.frame());
    let (frame, kinds) = dataset.into_parts();
    let filtered = frame.filter(&BooleanChunked::from_slice("complete".into(), &mask))?;
    Dataset::from_parts(filtered, kinds)
}

fn fill_columns(
    dataset: Dataset,
    method: ImputationMethod,
) -> Result<(Dataset, Map<String, Value>)> {
    let mut fills = Map::new();
    let mut columns = Vec::with_capacity(dataset.width());
    for (col, kind) in dataset.columns() {
        if col.null_count() == 0 {
            columns.push(col.clone());
            continue;
        }
        let (filled, fill_value) = fill_column(col, kind, method)?;
        fills.insert(col.name().to_string(), fill_value);
        columns.push(filled);
    }

    let frame = DataFrame::new(columns)?;
    let dataset = Dataset::from_parts(frame, dataset.kinds().to_vec())?;
    let mut details = Map::new();
    details.insert("fill_values".to_owned(), Value::Object(fills));
    Ok((dataset, details))
}

fn fill_column(
    col: &Column,
    kind: ColumnKind,
    method: ImputationMethod,
) -> Result<(Column, Value)> {
    let name = col.name();
    let unsupported =
        |reason: &str| FlowprepError::unsupported(name.as_str(), method.as_str(), reason);

    if kind == ColumnKind::MissingMarker || is_entirely_missing(col) {
        return Err(unsupported("column is entirely missing, no value to compute from"));
    }

    match (kind, method) {
        (ColumnKind::Numeric, _) => {
            let values = stats::float_values(col)?;
            let sorted = stats::present_sorted(&values);
            let fill = match method {
                ImputationMethod::Mean => stats::mean(&sorted),
                ImputationMethod::Median => stats::median(&sorted),
                _ => stats::mode_f64(&sorted),
            }
            .ok_or_else(|| unsupported("no non-missing values"))?;
            let filled = values.into_iter().map(|v| Some(v.unwrap_or(fill))).collect();
            Ok((stats::float_column(name, filled), Value::from(fill)))
        }
        (ColumnKind::Categorical, ImputationMethod::Mode) => {
            let values = stats::string_values(col)?;
            let fill = stats::mode_str(values.iter().flatten().map(String::as_str))
                .map(str::to_owned)
                .ok_or_else(|| unsupported("no non-missing values"))?;
            let filled = values
                .into_iter()
                .map(|v| Some(v.unwrap_or_else(|| fill.clone())))
                .collect();
            Ok((stats::string_column(name, filled), Value::from(fill)))
        }
        (ColumnKind::Categorical, _) => Err(unsupported("column is not numeric")),
        (kind, method) => Err(FlowprepError::processing(format!(
            "no fill rule for {kind} column '{name}' with method {method}"
        ))),
    }
}
