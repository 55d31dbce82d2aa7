//! Export of pipeline results to CSV, JSON and Parquet

use flowprep::dataset::Dataset;
use flowprep::export::write_result;
use flowprep::io::load_csv;
use flowprep::options::{OutputFormat, PreprocessingOptions};
use flowprep::pipeline::run_pipeline;
use polars::prelude::*;
use tempfile::TempDir;

fn sample() -> Dataset {
    let df = df!(
        "score" => [
            Some(3.5), None, Some(7.0), Some(1.0), Some(4.5),
            Some(9.0), Some(2.0), Some(6.5), Some(8.0), Some(5.0),
        ],
        "plan" => ["basic", "pro", "basic", "team", "pro", "basic", "team", "pro", "basic", "team"],
    )
    .unwrap();
    Dataset::new(df).unwrap()
}

#[test]
fn test_every_format_writes_three_files() {
    let options = PreprocessingOptions {
        random_state: Some(7),
        ..Default::default()
    };
    let result = run_pipeline(&sample(), &options).unwrap();

    for format in [OutputFormat::Csv, OutputFormat::Json, OutputFormat::Parquet] {
        let dir = TempDir::new().unwrap();
        let files = write_result(&result, dir.path(), "plans", format).unwrap();

        assert_eq!(
            files.train.file_name().and_then(|s| s.to_str()),
            Some(format!("plans_train.{}", format.extension()).as_str())
        );
        for path in [&files.processed, &files.train, &files.test] {
            assert!(path.exists(), "{} missing", path.display());
        }
    }
}

#[test]
fn test_csv_export_reads_back() {
    let options = PreprocessingOptions {
        random_state: Some(7),
        ..Default::default()
    };
    let result = run_pipeline(&sample(), &options).unwrap();
    let dir = TempDir::new().unwrap();
    let files =
        write_result(&result, &dir.path().join("nested"), "plans", OutputFormat::Csv).unwrap();

    let (train, _meta) = load_csv(&files.train).unwrap();
    assert_eq!(train.shape(), result.train_shape);
    assert_eq!(train.column_names(), result.processed.column_names());

    let (test, _meta) = load_csv(&files.test).unwrap();
    assert_eq!(test.height(), 2);
}

#[test]
fn test_empty_test_split_still_exported() {
    let options = PreprocessingOptions {
        test_size: 0.01,
        random_state: Some(7),
        ..Default::default()
    };
    let result = run_pipeline(&sample(), &options).unwrap();
    assert_eq!(result.test.height(), 0);

    let dir = TempDir::new().unwrap();
    let files = write_result(&result, dir.path(), "plans", OutputFormat::Parquet).unwrap();
    assert!(files.test.exists());

    let test = ParquetReader::new(std::fs::File::open(&files.test).unwrap())
        .finish()
        .unwrap();
    assert_eq!(test.height(), 0);
    assert_eq!(test.width(), result.processed.width());
}
