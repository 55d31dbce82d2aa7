use crate::error::{FlowprepError, Result, ResultExt as _};
use crate::logging::LoggingConfig;
use crate::options::{PreprocessingOptions, validate_options};
use crate::quota::TierLimitsTable;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Service-wide settings, stored as JSON.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub limits: TierLimitsTable,
    /// Raw preprocessing options used when a caller supplies none; validated on load.
    #[serde(default)]
    pub default_options: Map<String, Value>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Where the CLI writes results when no output directory is given.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("processed")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            limits: TierLimitsTable::default(),
            default_options: Map::new(),
            logging: LoggingConfig::default(),
            export_dir: default_export_dir(),
        }
    }
}

impl ServiceConfig {
    /// The validated default options.
    ///
    /// # Errors
    ///
    /// Fails if `default_options` does not validate.
    pub fn default_options(&self) -> Result<PreprocessingOptions> {
        validate_options(&self.default_options).context("default_options")
    }
}

/// `<config dir>/flowprep/config.json`.
///
/// # Errors
///
/// Fails when the platform has no configuration directory.
pub fn default_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| FlowprepError::config("config_path", "no configuration directory"))?;
    Ok(base.join("flowprep").join("config.json"))
}

/// Load the configuration at `path`, or the defaults if the file does not exist.
///
/// # Errors
///
/// A present but unreadable or malformed file is an error; it is never silently
/// replaced by defaults.
pub fn load(path: &Path) -> Result<ServiceConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(ServiceConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: ServiceConfig = serde_json::from_str(&content).map_err(|e| {
        FlowprepError::config(path.display().to_string(), format!("malformed config: {e}"))
    })?;
    config.default_options()?;
    tracing::info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// # Errors
///
/// Fails if the parent directory cannot be created or the file cannot be written.
pub fn save(path: &Path, config: &ServiceConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
