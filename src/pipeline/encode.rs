//! Categorical encoding. This is the only stage that turns a categorical column
//! into numeric ones.

use super::stage::{Stage, StageKind, StageOutput};
use super::stats;
use crate::dataset::{ColumnKind, Dataset};
use crate::error::{FlowprepError, Result};
use crate::options::{Choice as _, EncodingMethod};
use polars::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct Encoding {
    pub method: EncodingMethod,
}

impl Stage for Encoding {
    fn kind(&self) -> StageKind {
        StageKind::Encoding
    }

    fn parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("method".to_owned(), self.method.as_str().into());
        params
    }

    fn apply(&self, dataset: Dataset) -> Result<StageOutput> {
        let categorical = dataset
            .kinds()
            .iter()
            .filter(|k| **k == ColumnKind::Categorical)
            .count();
        if self.method == EncodingMethod::None || categorical == 0 {
            return Ok(StageOutput::unchanged(
                dataset,
                format!("Encoded 0 categorical columns (method: {})", self.method),
            ));
        }

        let height = dataset.height();
        let mut columns = Vec::with_capacity(dataset.width());
        let mut kinds = Vec::with_capacity(dataset.width());
        let mut encoded: Vec<Value> = Vec::new();
        let mut produced: Vec<Value> = Vec::new();
        // Names already present in the output; one-hot columns must not reuse them.
        let mut taken: HashSet<String> = dataset
            .columns()
            .filter(|(_, kind)| *kind != ColumnKind::Categorical)
            .map(|(col, _)| col.name().to_string())
            .collect();

        for (col, kind) in dataset.columns() {
            if kind != ColumnKind::Categorical {
                columns.push(col.clone());
                kinds.push(kind);
                continue;
            }
            let values = stats::string_values(col)?;
            let categories = stats::first_seen(&values);
            tracing::debug!(
                column = %col.name(),
                categories = categories.len(),
                method = %self.method,
                "Encoding column"
            );
            match self.method {
                EncodingMethod::OneHot => {
                    for category in &categories {
                        let name = format!("{}_{category}", col.name());
                        if !taken.insert(name.clone()) {
                            return Err(FlowprepError::unsupported(
                                col.name().as_str(),
                                self.method.as_str(),
                                format!("output column '{name}' already exists"),
                            ));
                        }
                        let indicator: Vec<i32> = values
                            .iter()
                            .map(|v| i32::from(v.as_deref() == Some(*category)))
                            .collect();
                        columns.push(Column::from(Series::new(name.as_str().into(), indicator)));
                        kinds.push(ColumnKind::Numeric);
                        produced.push(name.into());
                    }
                }
                EncodingMethod::Label => {
                    let codes: Vec<Option<u32>> = values
                        .iter()
                        .map(|v| {
                            v.as_deref().and_then(|v| {
                                categories.iter().position(|c| *c == v).map(|p| p as u32)
                            })
                        })
                        .collect();
                    columns.push(Column::from(Series::new(col.name().clone(), codes)));
                    kinds.push(ColumnKind::Numeric);
                    produced.push(col.name().as_str().into());
                }
                EncodingMethod::None => {
                    columns.push(col.clone());
                    kinds.push(kind);
                    continue;
                }
            }
            encoded.push(col.name().as_str().into());
        }

        let frame = DataFrame::new(columns)?;
        let dataset = Dataset::from_parts(frame, kinds)?;

        let mut details = Map::new();
        details.insert("source_columns".to_owned(), Value::Array(encoded));
        details.insert("encoded_columns".to_owned(), Value::Array(produced));
        Ok(StageOutput {
            summary: format!(
                "Encoded {categorical} categorical columns (method: {})",
                self.method
            ),
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
            Column::from(Series::new("x".into(), vec![1.0, 2.0, 3.0, 4.0])),
            Column::from(Series::new("color".into(), vec!["red", "blue", "red", "green"])),
            Column::from(Series::new("y".into(), vec![5i64, 6, 7, 8])),
        ])
        .unwrap();
        Dataset::new(frame).unwrap()
    }

    fn encode(method: EncodingMethod, dataset: Dataset) -> StageOutput {
        Encoding { method }.apply(dataset).unwrap()
    }

    #[test]
    fn test_onehot_in_first_seen_order_at_original_position() {
        let out = encode(EncodingMethod::OneHot, sample());
        assert_eq!(
            out.dataset.column_names(),
            vec!["x", "color_red", "color_blue", "color_green", "y"]
        );
        assert!(out.dataset.kinds().iter().all(|k| *k == ColumnKind::Numeric));
        let red = stats::float_values(out.dataset.frame().column("color_red").unwrap()).unwrap();
        assert_eq!(red, vec![Some(1.0), Some(0.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn test_label_codes_in_first_seen_order() {
        let out = encode(EncodingMethod::Label, sample());
        assert_eq!(out.dataset.column_names(), vec!["x", "color", "y"]);
        let codes = stats::float_values(out.dataset.frame().column("color").unwrap()).unwrap();
        assert_eq!(codes, vec![Some(0.0), Some(1.0), Some(0.0), Some(2.0)]);
        assert_eq!(out.dataset.kind_of("color"), Some(ColumnKind::Numeric));
    }

    #[test]
    fn test_none_leaves_categorical_untouched() {
        let out = encode(EncodingMethod::None, sample());
        assert_eq!(out.dataset.kind_of("color"), Some(ColumnKind::Categorical));
        assert_eq!(out.rows_affected, 0);
    }

    #[test]
    fn test_boolean_columns_are_encoded() {
        let frame = DataFrame::new(vec![Column::from(Series::new(
            "flag".into(),
            vec![true, false, true],
        ))])
        .unwrap();
        let out = encode(EncodingMethod::OneHot, Dataset::new(frame).unwrap());
        assert_eq!(out.dataset.column_names(), vec!["flag_true", "flag_false"]);
    }

    #[test]
    fn test_onehot_name_clash_is_unsupported() {
        let frame = DataFrame::new(vec![
            Column::from(Series::new("c_a".into(), vec![1.0, 2.0, 3.0])),
            Column::from(Series::new("c".into(), vec!["a", "b", "a"])),
        ])
        .unwrap();
        let dataset = Dataset::new(frame).unwrap();

        let err = Encoding {
            method: EncodingMethod::OneHot,
        }
        .apply(dataset.clone())
        .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::UnsupportedOperation);
        let message = err.to_string();
        assert!(message.contains("'c'") && message.contains("c_a"), "{message}");

        let out = encode(EncodingMethod::Label, dataset);
        assert_eq!(out.dataset.column_names(), vec!["c_a", "c"]);
    }
}
