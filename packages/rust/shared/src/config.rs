//! Application configuration for feedmill.
//!
//! User config lives at `~/.feedmill/feedmill.toml`.
//! CLI flags override config file values, which override defaults.
//! The file schema ([`AppConfig`]) is resolved once at process start into an
//! [`IngestConfig`] that every pipeline component receives explicitly.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FeedmillError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "feedmill.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".feedmill";

// ---------------------------------------------------------------------------
// Config structs (matching feedmill.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daily publish window.
    #[serde(default)]
    pub publish: PublishConfig,

    /// Synthetic daily-topic generator.
    #[serde(default)]
    pub topics: TopicsConfig,

    /// Simulated ranking generator.
    #[serde(default)]
    pub rankings: RankingsConfig,

    /// Periodic summary generator.
    #[serde(default)]
    pub summaries: SummariesConfig,

    /// External syndication feeds.
    #[serde(default)]
    pub syndication: SyndicationConfig,

    /// Commerce catalog API.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Retry/timeout/backoff for outbound requests.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Operator notification sink.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Persistence location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Append-only run log.
    #[serde(default)]
    pub run_log: RunLogConfig,
}

/// `[publish]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Local hour the publish window opens.
    #[serde(default = "default_window_start")]
    pub window_start_hour: u32,

    /// Local hour the publish window closes.
    #[serde(default = "default_window_end")]
    pub window_end_hour: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            window_start_hour: default_window_start(),
            window_end_hour: default_window_end(),
        }
    }
}

fn default_window_start() -> u32 {
    9
}
fn default_window_end() -> u32 {
    23
}

/// `[topics]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Number of topics generated per run.
    #[serde(default = "default_daily_count")]
    pub daily_count: usize,

    /// Generator seed; today's date when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            daily_count: default_daily_count(),
            seed: None,
        }
    }
}

fn default_daily_count() -> usize {
    26
}

/// `[rankings]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingsConfig {
    /// Permutation seed; today's date when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,

    /// How many recent catalog items enter the simulation.
    #[serde(default = "default_ranking_pool")]
    pub pool_size: usize,

    /// How many ranks the report lists.
    #[serde(default = "default_ranking_top")]
    pub top_n: usize,
}

impl Default for RankingsConfig {
    fn default() -> Self {
        Self {
            seed: None,
            pool_size: default_ranking_pool(),
            top_n: default_ranking_top(),
        }
    }
}

fn default_ranking_pool() -> usize {
    30
}
fn default_ranking_top() -> usize {
    10
}

/// `[summaries]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummariesConfig {
    /// Weekly period key; today's date when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_key: Option<String>,

    /// Monthly period key; the current `YYYY-MM` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_key: Option<String>,
}

/// `[syndication]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyndicationConfig {
    /// Feed URLs. Empty means the syndication source yields nothing.
    #[serde(default)]
    pub feeds: Vec<String>,

    /// Maximum entries taken from each feed.
    #[serde(default = "default_items_per_feed")]
    pub max_items_per_feed: usize,
}

impl Default for SyndicationConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            max_items_per_feed: default_items_per_feed(),
        }
    }
}

fn default_items_per_feed() -> usize {
    5
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Paginated catalog API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Items requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on pages fetched per run.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: default_api_key_env(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_api_key_env() -> String {
    "FEEDMILL_CATALOG_API_KEY".into()
}
fn default_page_size() -> usize {
    20
}
fn default_max_pages() -> usize {
    1
}

/// `[fetch]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Retries after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-attempt deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Linear backoff base in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            timeout_ms: default_timeout_ms(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_retries() -> u32 {
    2
}
fn default_timeout_ms() -> u64 {
    8000
}
fn default_backoff_ms() -> u64 {
    800
}

/// `[notify]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook receiving `{"text": ...}` payloads. Unset disables notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "var/feedmill.db".into()
}

/// `[run_log]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogConfig {
    /// Directory for `ingest-<date>.log` files.
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

impl Default for RunLogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> String {
    "logs".into()
}

// ---------------------------------------------------------------------------
// Ingest config (runtime, resolved once per process)
// ---------------------------------------------------------------------------

/// Daily publish window in local hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Resolved settings for the daily-topic generator.
#[derive(Debug, Clone)]
pub struct TopicSettings {
    pub daily_count: usize,
    pub seed: String,
}

/// Resolved settings for the ranking generator.
#[derive(Debug, Clone)]
pub struct RankingSettings {
    pub seed: String,
    pub pool_size: usize,
    pub top_n: usize,
}

/// Resolved period keys for the summary generator.
#[derive(Debug, Clone)]
pub struct SummarySettings {
    pub weekly_key: String,
    pub monthly_key: String,
}

/// Resolved syndication settings.
#[derive(Debug, Clone)]
pub struct SyndicationSettings {
    pub feeds: Vec<String>,
    pub max_items_per_feed: usize,
}

/// Resolved catalog API settings.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub page_size: usize,
    pub max_pages: usize,
}

/// Runtime configuration for one ingest run, with every default resolved.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub publish: PublishWindow,
    pub topics: TopicSettings,
    pub rankings: RankingSettings,
    pub summaries: SummarySettings,
    pub syndication: SyndicationSettings,
    pub catalog: CatalogSettings,
    pub fetch: FetchSettings,
    pub notify_webhook: Option<String>,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
}

impl IngestConfig {
    /// Resolve file config against `today` (seeds and period keys default to it).
    ///
    /// The catalog API key is not read here; pass it via [`IngestConfig::with_catalog_api_key`].
    pub fn resolve(config: &AppConfig, today: NaiveDate) -> Self {
        let date_key = today.format("%Y-%m-%d").to_string();
        let month_key = today.format("%Y-%m").to_string();

        Self {
            publish: PublishWindow {
                start_hour: config.publish.window_start_hour,
                end_hour: config.publish.window_end_hour,
            },
            topics: TopicSettings {
                daily_count: config.topics.daily_count,
                seed: config.topics.seed.clone().unwrap_or_else(|| date_key.clone()),
            },
            rankings: RankingSettings {
                seed: config
                    .rankings
                    .seed
                    .clone()
                    .unwrap_or_else(|| date_key.clone()),
                pool_size: config.rankings.pool_size,
                top_n: config.rankings.top_n,
            },
            summaries: SummarySettings {
                weekly_key: config
                    .summaries
                    .weekly_key
                    .clone()
                    .unwrap_or_else(|| date_key.clone()),
                monthly_key: config.summaries.monthly_key.clone().unwrap_or(month_key),
            },
            syndication: SyndicationSettings {
                feeds: config
                    .syndication
                    .feeds
                    .iter()
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect(),
                max_items_per_feed: config.syndication.max_items_per_feed,
            },
            catalog: CatalogSettings {
                endpoint: config.catalog.endpoint.clone(),
                api_key: None,
                page_size: config.catalog.page_size,
                max_pages: config.catalog.max_pages,
            },
            fetch: config.fetch,
            notify_webhook: config
                .notify
                .webhook_url
                .clone()
                .filter(|u| !u.trim().is_empty()),
            database_path: PathBuf::from(&config.storage.database_path),
            log_dir: PathBuf::from(&config.run_log.dir),
        }
    }

    /// Attach the catalog API key resolved by the caller.
    pub fn with_catalog_api_key(mut self, key: Option<String>) -> Self {
        self.catalog.api_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Reject settings no component can honor.
    pub fn validate(&self) -> Result<()> {
        for (name, hour) in [
            ("window_start_hour", self.publish.start_hour),
            ("window_end_hour", self.publish.end_hour),
        ] {
            if hour > 23 {
                return Err(FeedmillError::validation(format!(
                    "{name} {hour} out of range (0-23)"
                )));
            }
        }
        if self.catalog.page_size == 0 {
            return Err(FeedmillError::validation("catalog page_size must be at least 1"));
        }
        for feed in &self.syndication.feeds {
            url::Url::parse(feed).map_err(|e| {
                FeedmillError::validation(format!("invalid feed URL '{feed}': {e}"))
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.feedmill/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FeedmillError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.feedmill/feedmill.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| FeedmillError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        FeedmillError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FeedmillError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FeedmillError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FeedmillError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the catalog API key from the env var named in the config, if set and non-empty.
pub fn catalog_api_key(config: &AppConfig) -> Option<String> {
    std::env::var(&config.catalog.api_key_env)
        .ok()
        .filter(|v| !v.is_empty())
}
