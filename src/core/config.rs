use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::auth::{AuthOptions, ANALYTICS_READONLY_SCOPE};
use crate::core::error::ReportError;
use crate::core::fetch::{FetchOptions, DEFAULT_API_BASE, MAX_PAGE_SIZE};
use crate::core::http::validate_endpoint;
use crate::core::retry::RetryPolicy;
use crate::core::writer::DEFAULT_SHEET_NAME;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

impl From<ConfigError> for ReportError {
    fn from(err: ConfigError) -> Self {
        ReportError::Configuration(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_format() -> String {
    "text".to_string()
}
fn default_color() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub credentials_path: Option<PathBuf>,
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_scope() -> String {
    ANALYTICS_READONLY_SCOPE.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            scope: default_scope(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub property_id: String,
    #[serde(default = "default_start_date")]
    pub start_date: String,
    #[serde(default = "default_end_date")]
    pub end_date: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: Vec<String>,
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub numeric_metrics: Vec<String>,
    pub limit: Option<usize>,
    pub order_by: Option<String>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default)]
    pub normalize_dates: bool,
}

fn default_start_date() -> String {
    "7daysAgo".to_string()
}
fn default_end_date() -> String {
    "yesterday".to_string()
}
fn default_dimensions() -> Vec<String> {
    ["date", "country", "deviceCategory", "sessionSource", "sessionMedium"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_metrics() -> Vec<String> {
    ["sessions", "totalUsers", "newUsers", "bounceRate", "screenPageViews"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_output() -> PathBuf {
    PathBuf::from("ga4_report.xlsx")
}
fn default_sheet_name() -> String {
    DEFAULT_SHEET_NAME.to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            property_id: String::new(),
            start_date: default_start_date(),
            end_date: default_end_date(),
            dimensions: default_dimensions(),
            metrics: default_metrics(),
            numeric_metrics: Vec::new(),
            limit: None,
            order_by: None,
            output: default_output(),
            sheet_name: default_sheet_name(),
            normalize_dates: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_page_size() -> usize {
    10_000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_max_pages() -> usize {
    1_000
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            max_pages: default_max_pages(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_ms),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            page_size: self.page_size,
            max_pages: self.max_pages,
            retry: self.retry_policy(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("ga4xl").join("config.toml")
    }

    /// Load config from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `GA4_PROPERTY_ID` when set.
    pub fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("GA4_PROPERTY_ID") {
            if !id.trim().is_empty() {
                self.report.property_id = id;
            }
        }
    }

    /// Serialize and write this config to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = self.to_toml()?;
        std::fs::write(path, content)
    }

    pub fn to_toml(&self) -> Result<String, std::io::Error> {
        toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            scope: self.auth.scope.clone(),
            timeout: self.fetch.timeout(),
            retry: self.fetch.retry_policy(),
        }
    }

    /// Fail with every validation issue joined into one configuration error.
    pub fn ensure_valid(&self) -> Result<(), ReportError> {
        let issues = self.validate();
        if issues.is_empty() {
            return Ok(());
        }
        Err(ReportError::Configuration(format!(
            "invalid configuration: {}",
            issues.join("; ")
        )))
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !["text", "json"].contains(&self.settings.default_format.as_str()) {
            issues.push(format!(
                "Invalid default_format: '{}' (must be 'text' or 'json')",
                self.settings.default_format
            ));
        }
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if self.report.metrics.is_empty() {
            issues.push("report.metrics is empty (at least one metric is required)".to_string());
        }
        for name in &self.report.numeric_metrics {
            if !self.report.metrics.contains(name) {
                issues.push(format!(
                    "report.numeric_metrics: '{}' is not in report.metrics",
                    name
                ));
            }
        }
        if self.report.sheet_name.trim().is_empty() || self.report.sheet_name.chars().count() > 31 {
            issues.push(format!(
                "Invalid sheet_name: '{}' (must be 1-31 characters)",
                self.report.sheet_name
            ));
        }
        if self.fetch.page_size == 0 || self.fetch.page_size > MAX_PAGE_SIZE {
            issues.push(format!(
                "Invalid fetch.page_size: {} (must be 1-{})",
                self.fetch.page_size, MAX_PAGE_SIZE
            ));
        }
        if self.fetch.max_attempts == 0 {
            issues.push("fetch.max_attempts must be at least 1".to_string());
        }
        if self.fetch.max_pages == 0 {
            issues.push("fetch.max_pages must be at least 1".to_string());
        }
        if self.fetch.timeout_secs == 0 {
            issues.push("fetch.timeout_secs must be at least 1".to_string());
        }
        if let Err(e) = validate_endpoint(&self.fetch.api_base, "fetch.api_base") {
            issues.push(e.to_string());
        }
        issues
    }
}
