//! In-memory dataset handle with fixed column kinds.

use crate::error::{FlowprepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The inferred role of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    /// Entirely missing; no values to infer a type from.
    MissingMarker,
}

impl ColumnKind {
    /// Infer the kind of a Polars dtype.
    ///
    /// Temporal and nested types are not supported by the pipeline.
    pub fn infer(dtype: &DataType) -> Option<Self> {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => Some(Self::Numeric),
            DataType::String | DataType::Boolean | DataType::Categorical(..) => {
                Some(Self::Categorical)
            }
            DataType::Null => Some(Self::MissingMarker),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::MissingMarker => "missing",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File metadata supplied by the ingestion layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub file_size: u64,
    pub row_count: u64,
    pub column_count: u64,
}

fn has_nan(series: &Series) -> Result<bool> {
    Ok(match series.dtype() {
        DataType::Float32 => series.f32()?.into_iter().any(|v| v.is_some_and(f32::is_nan)),
        DataType::Float64 => series.f64()?.into_iter().any(|v| v.is_some_and(f64::is_nan)),
        _ => false,
    })
}

fn nan_column(series: &Series) -> Result<Column> {
    let name = series.name().clone();
    let cleaned = match series.dtype() {
        DataType::Float32 => series
            .f32()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect::<Float32Chunked>()
            .with_name(name)
            .into_series(),
        DataType::Float64 => series
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect::<Float64Chunked>()
            .with_name(name)
            .into_series(),
        _ => series.clone(),
    };
    Ok(Column::from(cleaned))
}

/// Replace NaN in float columns with null.
fn nan_to_null(frame: DataFrame) -> Result<DataFrame> {
    let mut affected = Vec::new();
    for col in frame.get_columns() {
        if has_nan(col.as_materialized_series())? {
            affected.push(col.name().to_string());
        }
    }
    if affected.is_empty() {
        return Ok(frame);
    }

    tracing::debug!(columns = ?affected, "NaN values treated as missing");
    let columns = frame
        .get_columns()
        .iter()
        .map(|col| nan_column(col.as_materialized_series()))
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// A tabular dataset plus the kind of each column.
///
/// Kinds are inferred once in [`Dataset::new`]. Stages that replace columns go
/// through [`Dataset::from_parts`] and state the new kinds explicitly, so a
/// categorical column only becomes numeric inside the encoding stage.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    kinds: Vec<ColumnKind>,
}

impl Dataset {
    /// Float NaN values are turned into nulls here, so every later stage sees them
    /// as missing.
    ///
    /// # Errors
    ///
    /// Fails with an unsupported-operation error naming the first column whose
    /// dtype is neither numeric, categorical nor all-null.
    pub fn new(frame: DataFrame) -> Result<Self> {
        let frame = nan_to_null(frame)?;
        let kinds = frame
            .get_columns()
            .iter()
            .map(|col| {
                ColumnKind::infer(col.dtype()).ok_or_else(|| {
                    FlowprepError::unsupported(
                        col.name().as_str(),
                        "infer",
                        format!("dtype {} is not supported", col.dtype()),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { frame, kinds })
    }

    /// Reassemble a dataset after a stage changed it.
    ///
    /// # Errors
    ///
    /// Fails if the number of kinds does not match the number of columns.
    pub fn from_parts(frame: DataFrame, kinds: Vec<ColumnKind>) -> Result<Self> {
        if frame.width() != kinds.len() {
            return Err(FlowprepError::processing(format!(
                "column kind count {} does not match width {}",
                kinds.len(),
                frame.width()
            )));
        }
        Ok(Self { frame, kinds })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_parts(self) -> (DataFrame, Vec<ColumnKind>) {
        (self.frame, self.kinds)
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    /// Columns paired with their kinds, in order.
    pub fn columns(&self) -> impl Iterator<Item = (&Column, ColumnKind)> {
        self.frame.get_columns().iter().zip(self.kinds.iter().copied())
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.frame
            .get_column_index(name)
            .and_then(|idx| self.kinds.get(idx).copied())
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.frame.shape()
    }

    /// Total missing cells across all columns.
    pub fn missing_count(&self) -> usize {
        self.frame.get_columns().iter().map(Column::null_count).sum()
    }

    /// Missing cells in numeric columns only.
    pub fn numeric_missing_count(&self) -> usize {
        self.columns()
            .filter(|(_, kind)| *kind == ColumnKind::Numeric)
            .map(|(col, _)| col.null_count())
            .sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// Metadata for an in-memory dataset with a known source size.
    pub fn meta(&self, file_size: u64) -> DatasetMeta {
        DatasetMeta {
            file_size,
            row_count: self.height() as u64,
            column_count: self.width() as u64,
        }
    }
}
