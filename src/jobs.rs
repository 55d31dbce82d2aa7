//! Asynchronous preprocessing jobs.
//!
//! A job wraps one pipeline invocation with a lifecycle
//! (`pending → processing → completed | failed`), a monotonically increasing
//! progress value and error capture. [`JobManager::submit`] returns immediately; a
//! single worker per job drives the pipeline on Tokio's blocking pool while callers
//! poll [`JobManager::get_status`].
//!
//! ```no_run
//! use flowprep::dataset::Dataset;
//! use flowprep::jobs::JobManager;
//! use flowprep::options::PreprocessingOptions;
//! use polars::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = JobManager::new(tokio::runtime::Handle::current());
//! let dataset = Dataset::new(df!("x" => [1.0, 2.0, 3.0])?)?;
//! let id = manager.submit("sales-2024", dataset, PreprocessingOptions::default())?;
//!
//! let view = manager.wait(id).await?;
//! println!("{} at {:.0}%", view.status, view.progress * 100.0);
//! # Ok(())
//! # }
//! ```

mod manager;
mod record;
mod status;

pub use manager::JobManager;
pub use record::{JobError, JobId, JobSnapshot, JobStatusView, PreprocessingJob};
pub use status::JobStatus;
