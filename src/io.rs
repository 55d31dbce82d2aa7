//! CSV ingestion for the command-line front end.
//!
//! The library core never reads files; this adapter turns a CSV on disk into a
//! [`Dataset`] plus the metadata the quota check needs.

use crate::dataset::{Dataset, DatasetMeta};
use crate::error::{FlowprepError, Result, ResultExt as _};
use polars::prelude::*;
use std::path::Path;

/// Rows sampled for dtype inference.
const INFER_SCHEMA_ROWS: usize = 10_000;

/// # Errors
///
/// Fails if the file cannot be read or parsed, or contains a column whose dtype
/// the pipeline does not support.
pub fn load_csv(path: &Path) -> Result<(Dataset, DatasetMeta)> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    if extension != "csv" {
        return Err(FlowprepError::config(
            "input",
            format!("expected a .csv file, got '{}'", path.display()),
        ));
    }

    let file_size = std::fs::metadata(path)
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len();

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("opening {}", path.display()))?
        .finish()
        .with_context(|| format!("parsing {}", path.display()))?;

    let dataset = Dataset::new(df)?;
    let meta = dataset.meta(file_size);
    tracing::info!(
        path = %path.display(),
        rows = meta.row_count,
        columns = meta.column_count,
        bytes = file_size,
        "Dataset loaded"
    );
    Ok((dataset, meta))
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;
    use crate::dataset::ColumnKind;

    #[test]
    fn test_load_csv_infers_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "age,city,score\n31,Leeds,4.5\n,York,\n45,Leeds,3.0\n").unwrap();

        let (dataset, meta) = load_csv(&path).unwrap();
        assert_eq!(meta.row_count, 3);
        assert_eq!(meta.column_count, 3);
        assert!(meta.file_size > 0);
        assert_eq!(
            dataset.kinds(),
            &[ColumnKind::Numeric, ColumnKind::Categorical, ColumnKind::Numeric]
        );
        assert_eq!(dataset.missing_count(), 2);
    }

    #[test]
    fn test_nan_cells_load_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.csv");
        std::fs::write(&path, "x\n1.0\n2.0\nNaN\n4.0\n5.0\n").unwrap();

        let (dataset, _meta) = load_csv(&path).unwrap();
        assert_eq!(dataset.kinds(), &[ColumnKind::Numeric]);
        assert_eq!(dataset.missing_count(), 1);
    }

    #[test]
    fn test_non_csv_is_rejected() {
        let err = load_csv(Path::new("data.xlsx")).unwrap_err();
        assert!(err.to_string().contains("data.xlsx"));
    }
}
