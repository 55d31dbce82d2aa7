use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use flowprep::config::ServiceConfig;
use flowprep::jobs::{JobManager, JobStatus};
use flowprep::options::PreprocessingOptions;
use flowprep::quota::{Tier, TierPolicy, UsageCounters, usage_summary};
use flowprep::{export, io};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "flowprep",
    version,
    about = "Tiered tabular-data preprocessing"
)]
pub struct Cli {
    /// Path to the service configuration file
    #[arg(long, global = true, env = "FLOWPREP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log to the console only
    #[arg(long, global = true)]
    pub no_file_log: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preprocess a CSV file and export train/test splits
    Run {
        /// Input CSV file
        input: PathBuf,

        /// JSON file with preprocessing options. Defaults to the configured defaults.
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Output directory. Defaults to the configured export directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Tier whose limits apply
        #[arg(long, default_value = "free", value_parser = parse_tier)]
        tier: Tier,
    },
    /// Validate an options file and print the normalised options
    Validate {
        /// JSON file with preprocessing options
        options: PathBuf,
    },
    /// Print tier limits
    Limits {
        /// Only this tier
        #[arg(long, value_parser = parse_tier)]
        tier: Option<Tier>,
    },
}

fn parse_tier(s: &str) -> Result<Tier, String> {
    Tier::parse_tier(s).ok_or_else(|| format!("unknown tier '{s}' (allowed: free, premium)"))
}

pub async fn run_command(command: Commands, config: &ServiceConfig) -> Result<()> {
    match command {
        Commands::Run {
            input,
            options,
            output_dir,
            tier,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| config.export_dir.clone());
            handle_run(config, &input, options.as_deref(), &output_dir, tier).await
        }
        Commands::Validate { options } => handle_validate(&options),
        Commands::Limits { tier } => handle_limits(config, tier),
    }
}

fn read_options(path: &Path) -> Result<PreprocessingOptions> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {}", path.display()))?;
    Ok(PreprocessingOptions::from_json(&json)?)
}

async fn handle_run(
    config: &ServiceConfig,
    input: &Path,
    options_path: Option<&Path>,
    output_dir: &Path,
    tier: Tier,
) -> Result<()> {
    let options = match options_path {
        Some(path) => read_options(path)?,
        None => config.default_options()?,
    };
    let (dataset, meta) = io::load_csv(input)?;
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_owned();

    // The CLI keeps no usage history, so counters start at zero.
    let policy = TierPolicy::new(tier, UsageCounters::default()).with_limits(config.limits);
    let manager = JobManager::current()?;
    let job_id = manager.submit_checked(stem.clone(), dataset, &meta, options, &policy)?;
    println!("Submitted job {job_id} for '{}'", input.display());

    let view = manager.wait(job_id).await?;
    if view.status == JobStatus::Failed {
        let (category, stage, message) = view
            .error
            .map(|e| {
                (
                    e.category.to_string(),
                    e.stage.map_or_else(|| "-".to_owned(), |s| s.to_string()),
                    e.message,
                )
            })
            .unwrap_or_default();
        bail!("Job {job_id} failed ({category}, stage {stage}): {message}");
    }

    let result = manager.get_result(job_id)?;
    for record in &result.log {
        println!(
            "  {:<16} {:>8} rows affected  {:>9.3}ms  {}",
            record.stage.as_str(),
            record.rows_affected,
            record.duration.as_secs_f64() * 1000.0,
            record.summary
        );
    }
    println!("{}", result.summary());

    let files = export::write_result(&result, output_dir, &stem, options.output_format)?;
    println!("Processed: {}", files.processed.display());
    println!("Train:     {}", files.train.display());
    println!("Test:      {}", files.test.display());
    Ok(())
}

fn handle_validate(path: &Path) -> Result<()> {
    let options = read_options(path)?;
    println!("{}", options.to_json()?);
    if !options.remove_outliers {
        println!("note: outlier_method is ignored while remove_outliers is false");
    }
    Ok(())
}

fn handle_limits(config: &ServiceConfig, tier: Option<Tier>) -> Result<()> {
    let tiers = match tier {
        Some(tier) => vec![tier],
        None => vec![Tier::Free, Tier::Premium],
    };
    let fmt_limit =
        |limit: Option<u64>| limit.map_or_else(|| "unlimited".to_owned(), |l| l.to_string());
    for tier in tiers {
        let policy = TierPolicy::new(tier, UsageCounters::default()).with_limits(config.limits);
        let summary = usage_summary(&policy);
        println!("{tier}:");
        println!("  max file size:      {} bytes", fmt_limit(summary.max_file_size));
        println!("  max rows:           {}", fmt_limit(summary.max_rows));
        println!("  datasets per month: {}", fmt_limit(summary.datasets.limit));
        println!("  calls per month:    {}", fmt_limit(summary.api_calls.limit));
    }
    Ok(())
}
