//! # flowprep - tiered tabular-data preprocessing
//!
//! flowprep turns an in-memory table into a model-ready train/test pair. It
//! validates a closed set of preprocessing options, enforces per-tier quotas,
//! runs a fixed five-stage pipeline and wraps each run in an asynchronous job that
//! callers poll.
//!
//! ## Quick Start
//!
//! ```no_run
//! use flowprep::dataset::Dataset;
//! use flowprep::options::validate_options;
//! use flowprep::pipeline::run_pipeline;
//! use polars::prelude::*;
//! use serde_json::json;
//!
//! let df = df!(
//!     "income" => [Some(52_000.0), None, Some(61_500.0), Some(48_200.0)],
//!     "region" => ["north", "south", "north", "east"],
//! )?;
//! let raw = json!({ "scaling_method": "standard", "random_state": 42 });
//! let options = validate_options(raw.as_object().unwrap())?;
//!
//! let result = run_pipeline(&Dataset::new(df)?, &options)?;
//! println!("{}", result.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`options`]: validated, immutable preprocessing options
//! - [`quota`]: tier limits and admission control
//! - [`dataset`]: the dataset handle and its fixed column kinds
//! - [`pipeline`]: impute → encode → scale → outlier-filter → split
//! - [`jobs`]: asynchronous job lifecycle, progress and error capture
//! - [`error`]: error types and handling utilities
//!
//! Around the core sit [`config`] (JSON service configuration), [`logging`]
//! (tracing setup), [`io`] (CSV ingestion for the CLI) and [`export`] (writing
//! results as CSV, JSON or Parquet).
//!
//! ## Stage Order
//!
//! The stage order is a contract. Outlier thresholds are computed on scaled
//! values, so moving outlier removal before scaling would change which rows are
//! dropped.

pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod io;
pub mod jobs;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod quota;

pub use error::{FlowprepError, Result};
