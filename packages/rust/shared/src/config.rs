//! Application configuration for newsdesk.
//!
//! User config lives at `~/.newsdesk/newsdesk.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NewsdeskError, Result};
use crate::types::SourceDescriptor;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newsdesk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newsdesk";

/// Browser-like user agent shared by every outbound request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Origin of the exchange disclosure portal.
pub const DISCLOSURE_ORIGIN: &str = "https://www.idx.co.id";

/// Public announcements page; establishes the session the API expects.
pub const DISCLOSURE_LANDING_URL: &str =
    "https://www.idx.co.id/id/perusahaan-tercatat/keterbukaan-informasi/";

// ---------------------------------------------------------------------------
// Config structs (matching newsdesk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Collection and analysis tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// LLM endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Plain HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Headless browser settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Background scheduler cadence.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Source registry.
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

impl AppConfig {
    /// Sources flagged active, in registry order.
    pub fn active_sources(&self) -> Vec<SourceDescriptor> {
        self.sources.iter().filter(|s| s.active).cloned().collect()
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Entries per classifier request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Title similarity at or above which a candidate is a near-duplicate.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Extracted text shorter than this counts as a failure.
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,

    /// Characters of article text sent to the analysis service.
    #[serde(default = "default_analysis_char_budget")]
    pub analysis_char_budget: usize,

    /// Age in days after which `prune` removes records.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Pause between classifier batches and between analyzed records.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            similarity_threshold: default_similarity_threshold(),
            min_content_length: default_min_content_length(),
            analysis_char_budget: default_analysis_char_budget(),
            retention_days: default_retention_days(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    20
}
fn default_similarity_threshold() -> f64 {
    0.75
}
fn default_min_content_length() -> usize {
    100
}
fn default_analysis_char_budget() -> usize {
    5000
}
fn default_retention_days() -> u32 {
    3
}
fn default_batch_pause_ms() -> u64 {
    1000
}

/// `[llm]` section (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_filter_max_tokens")]
    pub filter_max_tokens: u32,

    #[serde(default = "default_analysis_max_tokens")]
    pub analysis_max_tokens: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            filter_max_tokens: default_filter_max_tokens(),
            analysis_max_tokens: default_analysis_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "openai/gpt-oss-120b".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_filter_max_tokens() -> u32 {
    2048
}
fn default_analysis_max_tokens() -> u32 {
    3072
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for feed and social API requests.
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,

    /// Timeout for the disclosure API request.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    /// Timeout for direct document (PDF) downloads.
    #[serde(default = "default_document_timeout")]
    pub document_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            feed_timeout_secs: default_feed_timeout(),
            api_timeout_secs: default_api_timeout(),
            document_timeout_secs: default_document_timeout(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

fn default_feed_timeout() -> u64 {
    15
}
fn default_api_timeout() -> u64 {
    30
}
fn default_document_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_accept_language() -> String {
    "id-ID,id;q=0.9,en-US;q=0.8,en;q=0.7".into()
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Pause before every browser fetch after the first.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Wait after navigation before reading the DOM.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Explicit Chrome/Chromium binary. Auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<String>,

    #[serde(default = "default_true")]
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay(),
            navigation_timeout_secs: default_navigation_timeout(),
            settle_ms: default_settle_ms(),
            locale: default_locale(),
            timezone: default_timezone(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            chrome_executable: None,
            headless: true,
        }
    }
}

fn default_request_delay() -> u64 {
    3000
}
fn default_navigation_timeout() -> u64 {
    30
}
fn default_settle_ms() -> u64 {
    3000
}
fn default_locale() -> String {
    "id-ID".into()
}
fn default_timezone() -> String {
    "Asia/Jakarta".into()
}
fn default_viewport_width() -> u32 {
    1920
}
fn default_viewport_height() -> u32 {
    1080
}
fn default_true() -> bool {
    true
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            interval_secs: default_interval(),
        }
    }
}

fn default_initial_delay() -> u64 {
    10
}
fn default_interval() -> u64 {
    300
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file. A leading `~/` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.newsdesk/newsdesk.db".into()
}

impl StorageConfig {
    /// Resolve `db_path`, expanding a leading `~/`.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match self.db_path.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir()
                    .ok_or_else(|| NewsdeskError::config("could not determine home directory"))?;
                Ok(home.join(rest))
            }
            None => Ok(PathBuf::from(&self.db_path)),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline settings (runtime, merged from config)
// ---------------------------------------------------------------------------

/// Runtime knobs for the collection cycle and analysis.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub similarity_threshold: f64,
    pub min_content_length: usize,
    pub analysis_char_budget: usize,
    pub batch_pause_ms: u64,
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.pipeline.batch_size.max(1),
            similarity_threshold: config.pipeline.similarity_threshold,
            min_content_length: config.pipeline.min_content_length,
            analysis_char_budget: config.pipeline.analysis_char_budget,
            batch_pause_ms: config.pipeline.batch_pause_ms,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newsdesk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| NewsdeskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newsdesk/newsdesk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsdeskError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        NewsdeskError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_sources(&config.sources)?;
    Ok(config)
}

/// Reject registries with duplicate source ids.
fn validate_sources(sources: &[SourceDescriptor]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for source in sources {
        if source.id.trim().is_empty() {
            return Err(NewsdeskError::config(format!(
                "source '{}' has an empty id",
                source.name
            )));
        }
        if !seen.insert(source.id.as_str()) {
            return Err(NewsdeskError::config(format!(
                "duplicate source id '{}'",
                source.id
            )));
        }
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsdeskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsdeskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsdeskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the LLM API key from the env var named in config.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(NewsdeskError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable (a .env file works too)."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceType;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("similarity_threshold"));
        assert!(toml_str.contains("GROQ_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.batch_size, 20);
        assert_eq!(parsed.browser.request_delay_ms, 3000);
        assert_eq!(parsed.scheduler.interval_secs, 300);
    }

    #[test]
    fn config_with_sources() {
        let toml_str = r#"
[pipeline]
batch_size = 10

[[sources]]
id = "1"
name = "CNBC Indonesia"
endpoint = "https://www.cnbcindonesia.com/market/rss"
source_type = "rss"

[[sources]]
id = "2"
name = "IDX"
endpoint = "https://www.idx.co.id/primary/ListedCompany/GetAnnouncement?dateTo=20240101"
source_type = "disclosure_api"
category = "Disclosure"
active = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].source_type, SourceType::DisclosureApi);
        assert_eq!(config.active_sources().len(), 1);
        assert_eq!(PipelineSettings::from(&config).batch_size, 10);
    }

    #[test]
    fn duplicate_source_ids_rejected() {
        let dir = std::env::temp_dir().join(format!("nd_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dup.toml");
        std::fs::write(
            &path,
            r#"
[[sources]]
id = "1"
name = "A"
endpoint = "https://a"
source_type = "rss"

[[sources]]
id = "1"
name = "B"
endpoint = "https://b"
source_type = "rss"
"#,
        )
        .unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate source id"));
    }

    #[test]
    fn db_path_expands_home() {
        let storage = StorageConfig::default();
        let resolved = storage.resolved_db_path().expect("resolve");
        assert!(resolved.ends_with(".newsdesk/newsdesk.db"));

        let explicit = StorageConfig {
            db_path: "/tmp/x.db".into(),
        };
        assert_eq!(explicit.resolved_db_path().unwrap(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "ND_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
