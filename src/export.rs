//! Writing pipeline results to disk.
//!
//! Three files are produced per result, `<stem>_processed`, `<stem>_train` and
//! `<stem>_test`, in the requested format. An empty test split is still written so
//! consumers always find the same file set.

use crate::error::{Result, ResultExt as _};
use crate::options::OutputFormat;
use crate::pipeline::PipelineResult;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Paths written by [`write_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub processed: PathBuf,
    pub train: PathBuf,
    pub test: PathBuf,
}

/// # Errors
///
/// Fails if the directory cannot be created or a file cannot be written.
pub fn write_result(
    result: &PipelineResult,
    dir: &Path,
    stem: &str,
    format: OutputFormat,
) -> Result<ExportedFiles> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let path_for = |part: &str| dir.join(format!("{stem}_{part}.{}", format.extension()));
    let files = ExportedFiles {
        processed: path_for("processed"),
        train: path_for("train"),
        test: path_for("test"),
    };

    write_frame(result.processed.frame(), &files.processed, format)?;
    write_frame(&result.train, &files.train, format)?;
    write_frame(&result.test, &files.test, format)?;

    tracing::info!(
        dir = %dir.display(),
        format = %format,
        train_rows = result.train.height(),
        test_rows = result.test.height(),
        "Results exported"
    );
    Ok(files)
}

/// # Errors
///
/// Fails if the file cannot be created or Polars cannot serialise the frame.
pub fn write_frame(frame: &DataFrame, path: &Path, format: OutputFormat) -> Result<()> {
    let mut df = frame.clone();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;

    match format {
        OutputFormat::Csv => {
            CsvWriter::new(file)
                .include_header(true)
                .finish(&mut df)
                .with_context(|| format!("writing CSV {}", path.display()))?;
        }
        OutputFormat::Json => {
            JsonWriter::new(file)
                .with_json_format(JsonFormat::Json)
                .finish(&mut df)
                .with_context(|| format!("writing JSON {}", path.display()))?;
        }
        OutputFormat::Parquet => {
            ParquetWriter::new(file)
                .finish(&mut df)
                .with_context(|| format!("writing Parquet {}", path.display()))?;
        }
    }
    tracing::debug!(path = %path.display(), rows = df.height(), "Frame written");
    Ok(())
}
