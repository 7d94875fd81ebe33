//! Configuration module for adsync.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! files, with loading, validation, defaults, and a builder pattern for
//! programmatic use.
//!
//! Two files are involved:
//! - the global [`Config`] (directories, sync defaults, locking, logging, API)
//! - one [`ClientConfig`] per client under `configs/clients/<slug>.yaml`

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::{
    newtypes::{ClientSlug, CustomerId},
    window::parse_timezone,
    DomainError,
};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for adsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub sync: SyncConfig,
    pub lock: LockConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
}

/// Directory layout. Every per-client file lives below `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub root: PathBuf,
}

/// Window sizing for backfill and incremental runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Days re-fetched before the watermark on each append.
    pub overlap_days: u32,
    /// Widest span an append may cover.
    pub max_window_days: u32,
    /// Years of history pulled by `init`.
    pub history_years: u32,
    /// Largest date span sent to the upstream API in one request.
    pub chunk_days: u32,
}

/// Per-client lock behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Seconds to wait for another process to release the lock.
    pub timeout_secs: u64,
    /// Seconds between acquisition attempts.
    pub poll_interval_secs: u64,
}

/// Schema validation sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Rows checked per validation pass (from the top of the dataset).
    pub sample_size: usize,
    /// Stop collecting messages after this many violations.
    pub max_errors: usize,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Log line format: `text` or `json`.
    pub format: String,
}

/// Reporting API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the reporting endpoint.
    pub base_url: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/adsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("adsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Derived paths
// ---------------------------------------------------------------------------

impl PathsConfig {
    pub fn configs_dir(&self) -> PathBuf {
        self.root.join("configs").join("clients")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn errors_dir(&self) -> PathBuf {
        self.root.join("errors")
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.root.join("schemas")
    }

    /// `configs/clients/<slug>.yaml`
    pub fn client_config_path(&self, slug: &ClientSlug) -> PathBuf {
        self.configs_dir().join(format!("{slug}.yaml"))
    }

    /// `state/<slug>.json`
    pub fn state_path(&self, slug: &ClientSlug) -> PathBuf {
        self.state_dir().join(format!("{slug}.json"))
    }

    /// `data/<slug>/<slug>-master-campaign_data.csv`
    pub fn dataset_path(&self, slug: &ClientSlug) -> PathBuf {
        self.data_dir()
            .join(slug.as_str())
            .join(format!("{slug}-master-campaign_data.csv"))
    }

    /// `locks/<slug>.lock`
    pub fn lock_path(&self, slug: &ClientSlug) -> PathBuf {
        self.locks_dir().join(format!("{slug}.lock"))
    }

    /// `errors/<slug>/`
    pub fn client_errors_dir(&self, slug: &ClientSlug) -> PathBuf {
        self.errors_dir().join(slug.as_str())
    }

    /// `schemas/campaign_data_v1.schema.json`
    pub fn campaign_schema_path(&self) -> PathBuf {
        self.schemas_dir().join("campaign_data_v1.schema.json")
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.
// (clippy::derivable_impls)

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("adsync"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            overlap_days: 3,
            max_window_days: 30,
            history_years: 1,
            chunk_days: 90,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            poll_interval_secs: 2,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            max_errors: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            token_env: "ADSYNC_API_TOKEN".to_string(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.chunk_days"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl SyncConfig {
    fn validate_into(&self, prefix: &str, errors: &mut Vec<ValidationError>) {
        positive(errors, &format!("{prefix}.max_window_days"), self.max_window_days.into());
        positive(errors, &format!("{prefix}.history_years"), self.history_years.into());
        positive(errors, &format!("{prefix}.chunk_days"), self.chunk_days.into());
        if self.overlap_days > self.max_window_days {
            errors.push(ValidationError {
                field: format!("{prefix}.overlap_days"),
                message: format!(
                    "overlap_days ({}) must not exceed max_window_days ({})",
                    self.overlap_days, self.max_window_days
                ),
            });
        }
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- paths ---
        if self.paths.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "paths.root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- sync ---
        self.sync.validate_into("sync", &mut errors);

        // --- lock ---
        positive(&mut errors, "lock.timeout_secs", self.lock.timeout_secs);
        positive(&mut errors, "lock.poll_interval_secs", self.lock.poll_interval_secs);

        // --- validation ---
        positive(&mut errors, "validation.sample_size", self.validation.sample_size as u64);
        positive(&mut errors, "validation.max_errors", self.validation.max_errors as u64);

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- api ---
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "api.base_url".into(),
                message: format!("must be an http(s) URL: {}", self.api.base_url),
            });
        }
        positive(&mut errors, "api.timeout_secs", self.api.timeout_secs);

        errors
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Per-client overrides of [`SyncConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOverrides {
    pub overlap_days: Option<u32>,
    pub max_window_days: Option<u32>,
    pub history_years: Option<u32>,
    pub chunk_days: Option<u32>,
}

/// Configuration for one client account (`configs/clients/<slug>.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Advertising account id, e.g. `413-902-2884`.
    pub customer_id: CustomerId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// IANA timezone of the account; all window math happens in it.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// ISO currency code stamped on every row.
    #[serde(default = "default_currency")]
    pub currency_code: String,
    #[serde(default)]
    pub sync: SyncOverrides,
}

fn default_timezone() -> String {
    "America/Chicago".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

impl ClientConfig {
    /// Load a client configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parsed account timezone.
    ///
    /// # Errors
    /// Returns `DomainError::UnknownTimezone` if `timezone` is not an IANA name
    pub fn tz(&self) -> Result<Tz, DomainError> {
        parse_timezone(&self.timezone)
    }

    /// Global sync settings with this client's overrides applied.
    pub fn effective_sync(&self, defaults: &SyncConfig) -> SyncConfig {
        SyncConfig {
            overlap_days: self.sync.overlap_days.unwrap_or(defaults.overlap_days),
            max_window_days: self.sync.max_window_days.unwrap_or(defaults.max_window_days),
            history_years: self.sync.history_years.unwrap_or(defaults.history_years),
            chunk_days: self.sync.chunk_days.unwrap_or(defaults.chunk_days),
        }
    }

    /// Validate the client configuration against the global defaults.
    pub fn validate(&self, defaults: &SyncConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Err(e) = self.tz() {
            errors.push(ValidationError {
                field: "timezone".into(),
                message: e.to_string(),
            });
        }
        if self.currency_code.len() != 3 || !self.currency_code.chars().all(|c| c.is_ascii_uppercase()) {
            errors.push(ValidationError {
                field: "currency_code".into(),
                message: format!("expected a 3-letter ISO code, got '{}'", self.currency_code),
            });
        }
        self.effective_sync(defaults).validate_into("sync", &mut errors);
        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`].
///
/// Starts from [`Config::default`] and lets callers override individual
/// fields before building.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- paths ---

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.paths.root = root.into();
        self
    }

    // --- sync ---

    pub fn sync_overlap_days(mut self, days: u32) -> Self {
        self.config.sync.overlap_days = days;
        self
    }

    pub fn sync_max_window_days(mut self, days: u32) -> Self {
        self.config.sync.max_window_days = days;
        self
    }

    pub fn sync_history_years(mut self, years: u32) -> Self {
        self.config.sync.history_years = years;
        self
    }

    pub fn sync_chunk_days(mut self, days: u32) -> Self {
        self.config.sync.chunk_days = days;
        self
    }

    // --- lock ---

    pub fn lock_timeout_secs(mut self, secs: u64) -> Self {
        self.config.lock.timeout_secs = secs;
        self
    }

    pub fn lock_poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.lock.poll_interval_secs = secs;
        self
    }

    // --- validation ---

    pub fn validation_sample_size(mut self, rows: usize) -> Self {
        self.config.validation.sample_size = rows;
        self
    }

    pub fn validation_max_errors(mut self, n: usize) -> Self {
        self.config.validation.max_errors = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_token_env(mut self, var: impl Into<String>) -> Self {
        self.config.api.token_env = var.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api.timeout_secs = secs;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.paths.root.to_string_lossy().contains("adsync"));
        assert_eq!(cfg.sync.overlap_days, 3);
        assert_eq!(cfg.sync.max_window_days, 30);
        assert_eq!(cfg.sync.history_years, 1);
        assert_eq!(cfg.sync.chunk_days, 90);
        assert_eq!(cfg.lock.timeout_secs, 300);
        assert_eq!(cfg.lock.poll_interval_secs, 2);
        assert_eq!(cfg.validation.sample_size, 100);
        assert_eq!(cfg.validation.max_errors, 10);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, "text");
        assert_eq!(cfg.api.token_env, "ADSYNC_API_TOKEN");
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
paths:
  root: /tmp/adsync-test
sync:
  overlap_days: 5
  max_window_days: 45
  history_years: 2
  chunk_days: 30
lock:
  timeout_secs: 60
  poll_interval_secs: 1
logging:
  level: debug
  format: json
api:
  base_url: https://reports.example.com
  token_env: REPORTS_TOKEN
  timeout_secs: 15
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.paths.root, PathBuf::from("/tmp/adsync-test"));
        assert_eq!(cfg.sync.overlap_days, 5);
        assert_eq!(cfg.sync.max_window_days, 45);
        assert_eq!(cfg.sync.history_years, 2);
        assert_eq!(cfg.sync.chunk_days, 30);
        assert_eq!(cfg.lock.timeout_secs, 60);
        assert_eq!(cfg.logging.format, "json");
        assert_eq!(cfg.api.base_url, "https://reports.example.com");
        // Section omitted from the file keeps its defaults
        assert_eq!(cfg.validation.sample_size, 100);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/adsync/config.yaml"));
        assert_eq!(cfg.sync.chunk_days, 90);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"sync: [not, a, map").unwrap();
        tmp.flush().unwrap();
        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_chunk_days() {
        let cfg = ConfigBuilder::new().sync_chunk_days(0).build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.chunk_days"));
    }

    #[test]
    fn validate_catches_overlap_exceeding_window() {
        let cfg = ConfigBuilder::new()
            .sync_overlap_days(40)
            .sync_max_window_days(30)
            .build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.overlap_days"));
    }

    #[test]
    fn validate_catches_zero_lock_values() {
        let cfg = ConfigBuilder::new()
            .lock_timeout_secs(0)
            .lock_poll_interval_secs(0)
            .build();
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"lock.timeout_secs".to_string()));
        assert!(fields.contains(&"lock.poll_interval_secs".to_string()));
    }

    #[test]
    fn validate_catches_invalid_log_level_and_format() {
        let cfg = ConfigBuilder::new()
            .logging_level("verbose")
            .logging_format("xml")
            .build();
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"logging.level".to_string()));
        assert!(fields.contains(&"logging.format".to_string()));
    }

    #[test]
    fn validate_catches_non_http_base_url() {
        let cfg = ConfigBuilder::new().api_base_url("ftp://example.com").build();
        assert!(cfg.validate().iter().any(|e| e.field == "api.base_url"));
    }

    #[test]
    fn build_validated_rejects_invalid() {
        assert!(ConfigBuilder::new().sync_history_years(0).build_validated().is_err());
        assert!(ConfigBuilder::new().build_validated().is_ok());
    }

    // -- Paths --

    #[test]
    fn per_client_paths() {
        let cfg = ConfigBuilder::new().root("/srv/adsync").build();
        let slug = ClientSlug::new("priority-roofing").unwrap();
        assert_eq!(
            cfg.paths.state_path(&slug),
            PathBuf::from("/srv/adsync/state/priority-roofing.json")
        );
        assert_eq!(
            cfg.paths.dataset_path(&slug),
            PathBuf::from("/srv/adsync/data/priority-roofing/priority-roofing-master-campaign_data.csv")
        );
        assert_eq!(
            cfg.paths.lock_path(&slug),
            PathBuf::from("/srv/adsync/locks/priority-roofing.lock")
        );
        assert_eq!(
            cfg.paths.client_config_path(&slug),
            PathBuf::from("/srv/adsync/configs/clients/priority-roofing.yaml")
        );
    }

    // -- Client config --

    #[test]
    fn client_config_defaults_and_overrides() {
        let yaml = r#"
customer_id: "413-902-2884"
name: Priority Roofing
sync:
  overlap_days: 7
"#;
        let client: ClientConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(client.customer_id.digits(), "4139022884");
        assert_eq!(client.timezone, "America/Chicago");
        assert_eq!(client.currency_code, "USD");

        let sync = client.effective_sync(&SyncConfig::default());
        assert_eq!(sync.overlap_days, 7);
        assert_eq!(sync.max_window_days, 30);
        assert!(client.validate(&SyncConfig::default()).is_empty());
    }

    #[test]
    fn client_config_rejects_bad_customer_id() {
        let yaml = "customer_id: \"12-34\"\n";
        assert!(serde_yaml::from_str::<ClientConfig>(yaml).is_err());
    }

    #[test]
    fn client_config_validate_catches_timezone_and_currency() {
        let yaml = r#"
customer_id: "4139022884"
timezone: Mars/Olympus
currency_code: usd
"#;
        let client: ClientConfig = serde_yaml::from_str(yaml).unwrap();
        let fields: Vec<_> = client
            .validate(&SyncConfig::default())
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert!(fields.contains(&"timezone".to_string()));
        assert!(fields.contains(&"currency_code".to_string()));
    }
}
