//! Configuration loading and resolution
//!
//! Settings come from four tiers, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing or unreadable TOML file never stops startup: the service logs a
//! warning and continues with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CAREVIEW_CONFIG";
/// Environment variable carrying the Microsoft Graph bearer token
pub const GRAPH_TOKEN_ENV: &str = "CAREVIEW_GRAPH_TOKEN";
/// Environment variable carrying the Airtable API key
pub const AIRTABLE_KEY_ENV: &str = "CAREVIEW_AIRTABLE_API_KEY";
/// Environment variable carrying the Airtable base id
pub const AIRTABLE_BASE_ENV: &str = "CAREVIEW_AIRTABLE_BASE_ID";

/// Largest accepted match tolerance, in hours (one leap year)
pub const MAX_TOLERANCE_HOURS: i64 = 8784;

/// Complete TOML configuration
///
/// Every section is optional in the file; absent sections take their defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub airtable: AirtableConfig,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub kpi: KpiConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Microsoft Graph (Bookings) client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    /// Bearer token; token acquisition happens outside this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// `$top` value per appointments page
    #[serde(default = "default_graph_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            access_token: None,
            page_size: default_graph_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Airtable client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AirtableConfig {
    #[serde(default = "default_airtable_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Records per page (Airtable caps this at 100)
    #[serde(default = "default_airtable_page_size")]
    pub page_size: u32,
    /// Attempts per page before pagination is abandoned
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Backoff base; attempt N waits `retry_base_ms * 2^N`
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub fields: AirtableFieldMap,
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_url: default_airtable_api_url(),
            api_key: None,
            base_id: None,
            table: None,
            page_size: default_airtable_page_size(),
            retry_attempts: default_retry_attempts(),
            retry_base_ms: default_retry_base_ms(),
            timeout_secs: default_timeout_secs(),
            fields: AirtableFieldMap::default(),
        }
    }
}

/// Airtable column names mapped onto the common record schema
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AirtableFieldMap {
    pub name: String,
    pub date: String,
    pub status: String,
    pub business: String,
    pub service: String,
    pub email: String,
    pub phone: String,
    pub duration: String,
}

impl Default for AirtableFieldMap {
    fn default() -> Self {
        Self {
            name: "Client".to_string(),
            date: "Date_of_Service".to_string(),
            status: "Status".to_string(),
            business: "Site".to_string(),
            service: "Service".to_string(),
            email: "Email".to_string(),
            phone: "Phone".to_string(),
            duration: "Duration".to_string(),
        }
    }
}

/// How source-B records may be claimed during greedy matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimPolicy {
    /// A source-B record is matched at most once; first claimant wins
    #[default]
    Exclusive,
    /// A source-B record may be matched by several source-A records
    Shared,
}

/// Default reconciliation parameters (requests may override them)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileSettings {
    /// Minimum similarity score (0-100) for a match
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Maximum timestamp distance for a match, in hours
    #[serde(default = "default_tolerance_hours")]
    pub tolerance_hours: i64,
    /// Require both timestamps on the same local calendar day instead
    #[serde(default)]
    pub same_day: bool,
    #[serde(default)]
    pub claim_policy: ClaimPolicy,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            tolerance_hours: default_tolerance_hours(),
            same_day: false,
            claim_policy: ClaimPolicy::default(),
        }
    }
}

/// Daily KPI report scoring
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KpiConfig {
    #[serde(default)]
    pub fields: KpiFieldMap,
    #[serde(default)]
    pub weights: KpiWeights,
}

/// Airtable column names of the daily KPI report table
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KpiFieldMap {
    pub leader: String,
    pub site: String,
    pub date: String,
    pub eargym_promotion: String,
    pub crossbooking: String,
    pub botd_eod_filled: String,
    pub photos_videos_testimonials: String,
    pub xrays_notes_uploaded: String,
    pub if_no_why: String,
}

impl Default for KpiFieldMap {
    fn default() -> Self {
        Self {
            leader: "Select".to_string(),
            site: "Sites (from Tags)".to_string(),
            date: "Date".to_string(),
            eargym_promotion: "# of Eargym Promotion".to_string(),
            crossbooking: "# of crossbooking".to_string(),
            botd_eod_filled: "Are BOTD and EOD already filled?".to_string(),
            photos_videos_testimonials: "Number of photos/Videos/Testimonials posted at the Teams channel"
                .to_string(),
            xrays_notes_uploaded: "Are all Xray's and Dental Notes uploaded to the right platforms?".to_string(),
            if_no_why: "If No, Why?".to_string(),
        }
    }
}

/// Relative weight of each KPI in the performance score
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KpiWeights {
    pub eargym_promotion: f64,
    pub crossbooking: f64,
    pub botd_eod_filled: f64,
    pub photos_videos_testimonials: f64,
    pub xrays_notes_uploaded: f64,
}

impl Default for KpiWeights {
    fn default() -> Self {
        Self {
            eargym_promotion: 1.0,
            crossbooking: 1.0,
            botd_eod_filled: 1.0,
            photos_videos_testimonials: 1.0,
            xrays_notes_uploaded: 1.0,
        }
    }
}

impl KpiWeights {
    /// Sum of the weights, `None` unless every weight is finite and
    /// non-negative and the sum is positive
    pub fn total(&self) -> Option<f64> {
        let weights = [
            self.eargym_promotion,
            self.crossbooking,
            self.botd_eod_filled,
            self.photos_videos_testimonials,
            self.xrays_notes_uploaded,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let total: f64 = weights.iter().sum();
        (total > 0.0).then_some(total)
    }
}

/// Presentation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Local UTC offset used for calendar-day grouping and date filters
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5730
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_graph_page_size() -> u32 {
    500
}

fn default_airtable_api_url() -> String {
    "https://api.airtable.com/v0".to_string()
}

fn default_airtable_page_size() -> u32 {
    100
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_threshold() -> u8 {
    85
}

fn default_tolerance_hours() -> i64 {
    24
}

fn default_utc_offset_minutes() -> i32 {
    -300 // US/Eastern standard time
}

impl TomlConfig {
    /// Fill secrets from the environment where the environment wins over TOML
    pub fn apply_env_overrides(&mut self) {
        self.graph.access_token = resolve_secret(GRAPH_TOKEN_ENV, self.graph.access_token.take());
        self.airtable.api_key = resolve_secret(AIRTABLE_KEY_ENV, self.airtable.api_key.take());
        self.airtable.base_id = resolve_secret(AIRTABLE_BASE_ENV, self.airtable.base_id.take());
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.reconcile.threshold > 100 {
            return Err(Error::Config(format!(
                "reconcile.threshold must be 0-100, got {}",
                self.reconcile.threshold
            )));
        }
        if !(0..=MAX_TOLERANCE_HOURS).contains(&self.reconcile.tolerance_hours) {
            return Err(Error::Config(format!(
                "reconcile.tolerance_hours must be 0-{}, got {}",
                MAX_TOLERANCE_HOURS, self.reconcile.tolerance_hours
            )));
        }
        if self.airtable.page_size == 0 || self.airtable.page_size > 100 {
            return Err(Error::Config(format!(
                "airtable.page_size must be 1-100, got {}",
                self.airtable.page_size
            )));
        }
        if self.kpi.weights.total().is_none() {
            return Err(Error::Config(
                "kpi.weights must be non-negative with a positive sum".to_string(),
            ));
        }
        if self.display.utc_offset_minutes.abs() > 14 * 60 {
            return Err(Error::Config(format!(
                "display.utc_offset_minutes out of range: {}",
                self.display.utc_offset_minutes
            )));
        }
        Ok(())
    }
}

/// Resolve which config file to read
///
/// **Priority:** CLI argument → `CAREVIEW_CONFIG` → platform default (if it exists)
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Platform config location: `<config_dir>/careview/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("careview").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Write a TOML config atomically (temp file + rename)
///
/// On Unix the file is restricted to 0600 since it may hold API secrets.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Validate a secret value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Pick a secret from environment or TOML, environment first
fn resolve_secret(env_var: &str, toml_value: Option<String>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    match (env_value, toml_value) {
        (Some(env), Some(_)) => {
            warn!("{} set in both environment and TOML; using environment", env_var);
            Some(env)
        }
        (Some(env), None) => Some(env),
        (None, toml) => toml,
    }
}
