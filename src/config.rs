use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api;
use crate::cache::{CacheOptions, RetryDelay};
use crate::resources::DEFAULT_PAGE_SIZE;

const DEFAULT_ENV_PREFIX: &str = "REELVIEW";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub category: CategoryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("reelview/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_deduping_interval", with = "humantime_serde")]
    pub deduping_interval: Duration,
    #[serde(default)]
    pub revalidate_on_focus: bool,
    #[serde(default)]
    pub revalidate_on_reconnect: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            deduping_interval: default_deduping_interval(),
            revalidate_on_focus: false,
            revalidate_on_reconnect: false,
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl CacheConfig {
    pub fn to_options(&self) -> CacheOptions {
        CacheOptions {
            deduping_interval: self.deduping_interval,
            revalidate_on_focus: self.revalidate_on_focus,
            revalidate_on_reconnect: self.revalidate_on_reconnect,
            max_retries: self.max_retries,
            retry_delay: RetryDelay::Fixed(self.retry_delay),
        }
    }
}

fn default_deduping_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(3)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

/// Defaults, then the YAML file (explicit path or the per-user default), then
/// `REELVIEW_SECTION__FIELD` environment overrides.
pub fn load(options: LoadOptions) -> Result<Config> {
    let path = options.config_file.clone().or_else(default_config_path);
    let mut cfg = match path {
        Some(path) if path.exists() => read_config_file(&path)?,
        _ => Config::default(),
    };

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);
    validate(&cfg)?;

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    if data.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn validate(cfg: &Config) -> Result<()> {
    anyhow::ensure!(
        !cfg.api.base_url.trim().is_empty(),
        "config: api.base_url is required"
    );
    anyhow::ensure!(
        cfg.category.page_size > 0,
        "config: category.page_size must be positive"
    );
    Ok(())
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            apply_env_value(cfg, &normalized, value);
        }
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "cache.deduping_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.cache.deduping_interval = duration;
            }
        }
        "cache.revalidate_on_focus" => cfg.cache.revalidate_on_focus = parse_flag(&value),
        "cache.revalidate_on_reconnect" => cfg.cache.revalidate_on_reconnect = parse_flag(&value),
        "cache.max_retries" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.cache.max_retries = parsed;
            }
        }
        "cache.retry_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.cache.retry_delay = duration;
            }
        }
        "category.page_size" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.category.page_size = parsed;
            }
        }
        "log.level" => cfg.log.level = value,
        _ => {}
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reelview").join("config.yaml"))
}
