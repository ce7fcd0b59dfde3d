use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_DATA_SOURCE: &str = "mock";
const DEFAULT_DASHBOARD_REFRESH_SECS: u64 = 30;
const DEFAULT_DEFECT_ALERT_THRESHOLD: f64 = 5.0;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_RECORD_API_TIMEOUT_SECS: u64 = 10;

/// Where the remote-backed collections (machines, materials, finished goods,
/// orders) read and write their records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSource {
    /// Everything lives in process, seeded from fixtures
    Mock,
    /// Remote tabular record API, falling back to fixtures on read failure
    Remote,
}

/// Remote record API settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RecordApiConfig {
    /// Base URL, e.g. `https://records.example.com/v1/bases/plant`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_record_api_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,
}

impl Default for RecordApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_record_api_timeout_secs(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// "mock" or "remote"
    #[serde(default = "default_data_source")]
    #[validate(custom = "validate_data_source")]
    pub data_source: String,

    /// Remote record API
    #[serde(default)]
    #[validate]
    pub record_api: RecordApiConfig,

    /// Dashboard refresh period in seconds
    #[serde(default = "default_dashboard_refresh_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub dashboard_refresh_secs: u64,

    /// Defect rate (percent) above which a quality alert is raised
    #[serde(default = "default_defect_alert_threshold")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub defect_alert_threshold: f64,

    /// Synthesize material requirements for work orders created without any
    #[serde(default = "default_true_bool")]
    pub auto_materials: bool,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            data_source: default_data_source(),
            record_api: RecordApiConfig::default(),
            dashboard_refresh_secs: default_dashboard_refresh_secs(),
            defect_alert_threshold: default_defect_alert_threshold(),
            auto_materials: true,
            event_channel_capacity: default_event_channel_capacity(),
            cors_allowed_origins: None,
        }
    }
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn data_source(&self) -> DataSource {
        if self.data_source.eq_ignore_ascii_case("remote") {
            DataSource::Remote
        } else {
            DataSource::Mock
        }
    }

    pub fn dashboard_refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dashboard_refresh_secs)
    }

    /// Parsed CORS origins; empty when unset
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Checks that cannot be expressed as field validators
    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.data_source() == DataSource::Remote {
            let missing = self
                .record_api
                .base_url
                .as_deref()
                .map(|url| url.trim().is_empty())
                .unwrap_or(true);
            if missing {
                let mut err = ValidationError::new("record_api");
                err.message =
                    Some("record_api.base_url is required when data_source = \"remote\"".into());
                errors.add("record_api", err);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_data_source() -> String {
    DEFAULT_DATA_SOURCE.to_string()
}

fn default_record_api_timeout_secs() -> u64 {
    DEFAULT_RECORD_API_TIMEOUT_SECS
}

fn default_dashboard_refresh_secs() -> u64 {
    DEFAULT_DASHBOARD_REFRESH_SECS
}

fn default_defect_alert_threshold() -> f64 {
    DEFAULT_DEFECT_ALERT_THRESHOLD
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_true_bool() -> bool {
    true
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_data_source(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "mock" | "remote" => Ok(()),
        _ => {
            let mut err = ValidationError::new("data_source");
            err.message = Some("Must be one of: mock, remote".into());
            Err(err)
        }
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("plantops_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(CONFIG_DIR)
}

/// Same as [`load_config`] but reading files from `config_dir`.
pub fn load_config_from(config_dir: &str) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(config_dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir
        );
    }

    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        data_source = %app_config.data_source,
        port = app_config.port,
        "Configuration loaded successfully"
    );
    Ok(app_config)
}
