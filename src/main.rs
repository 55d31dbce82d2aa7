//! # flowprep command-line entry point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Load service configuration
//!   ├─> Initialise logging (console + rotating files)
//!   └─> Create Tokio runtime and run the command
//! ```
//!
//! ```bash
//! flowprep run data.csv --options opts.json --output-dir out/
//! flowprep validate opts.json
//! flowprep limits --tier free
//! ```

#![expect(clippy::print_stdout)]

mod cli;

use anyhow::Result;
use clap::Parser as _;
use flowprep::{config, logging};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_path()?,
    };
    let mut service_config = config::load(&config_path)?;
    if cli.no_file_log {
        service_config.logging.file_logging = false;
    }
    let _log_guards = logging::init(&service_config.logging)?;

    tokio::runtime::Runtime::new()?.block_on(cli::run_command(cli.command, &service_config))
}
