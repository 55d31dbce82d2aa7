//! Stage identity, the stage trait and the per-stage log record.

use crate::dataset::Dataset;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Imputation,
    Encoding,
    Scaling,
    OutlierRemoval,
    Splitting,
}

impl StageKind {
    pub const ALL: [Self; 5] = [
        Self::Imputation,
        Self::Encoding,
        Self::Scaling,
        Self::OutlierRemoval,
        Self::Splitting,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imputation => "imputation",
            Self::Encoding => "encoding",
            Self::Scaling => "scaling",
            Self::OutlierRemoval => "outlier_removal",
            Self::Splitting => "splitting",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dataset-to-dataset transformation.
///
/// Stages are stateless: parameters are fixed at construction and `apply` is a pure
/// function of its input.
pub trait Stage {
    fn kind(&self) -> StageKind;

    /// Parameters as applied, for the log.
    fn parameters(&self) -> Map<String, Value>;

    /// # Errors
    ///
    /// Returns an unsupported-operation error when the method cannot apply to a
    /// column, or a processing error on internal failure.
    fn apply(&self, dataset: Dataset) -> Result<StageOutput>;
}

/// What a stage produced.
#[derive(Debug)]
pub struct StageOutput {
    pub dataset: Dataset,
    pub rows_affected: usize,
    pub summary: String,
    /// Extra facts learned while applying (fill values, produced columns, ...).
    pub details: Map<String, Value>,
}

impl StageOutput {
    /// A pass-through that changed nothing.
    pub fn unchanged(dataset: Dataset, summary: impl Into<String>) -> Self {
        Self {
            dataset,
            rows_affected: 0,
            summary: summary.into(),
            details: Map::new(),
        }
    }
}

/// One entry of the pipeline log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub parameters: Map<String, Value>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_affected: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub duration: Duration,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_names() {
        let names: Vec<String> = StageKind::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            ["imputation", "encoding", "scaling", "outlier_removal", "splitting"]
        );
        assert_eq!(StageKind::COUNT, 5);
    }
}
