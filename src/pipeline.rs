//! The preprocessing transformation pipeline.
//!
//! Five stages run in a fixed order on an in-memory [`Dataset`]:
//!
//! 1. **Imputation**: fill missing values (mean/median/mode) or drop incomplete rows
//! 2. **Encoding**: one-hot or label encode categorical columns
//! 3. **Scaling**: minmax, standard or robust scaling of numeric columns
//! 4. **Outlier removal**: drop rows flagged by IQR or z-score, computed on the
//!    already-scaled values
//! 5. **Splitting**: shuffle and partition into train and test subsets
//!
//! A stage that its option disables still runs as a pass-through and still appends a
//! [`StageRecord`], so the log is a complete audit trail. Any stage failure aborts
//! the run and nothing partial is returned.
//!
//! # Example
//!
//! ```no_run
//! use flowprep::dataset::Dataset;
//! use flowprep::options::PreprocessingOptions;
//! use flowprep::pipeline::run_pipeline;
//! use polars::prelude::*;
//!
//! let df = df!("x" => [Some(1.0), None, Some(3.0)], "c" => ["a", "b", "a"])?;
//! let dataset = Dataset::new(df)?;
//! let options = PreprocessingOptions { random_state: Some(42), ..Default::default() };
//!
//! let result = run_pipeline(&dataset, &options)?;
//! for record in &result.log {
//!     println!("{}: {}", record.stage, record.summary);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod encode;
pub mod executor;
pub mod impute;
pub mod outliers;
pub mod scale;
pub mod split;
pub mod stage;
pub mod stats;

#[cfg(test)]
mod tests;

pub use executor::{PipelineResult, run_pipeline, run_pipeline_with_progress};
pub use stage::{Stage, StageKind, StageOutput, StageRecord};
