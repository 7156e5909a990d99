use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::util::env::{env_flag, env_opt, env_parse, env_req};

pub const DEFAULT_BASE_URL: &str = "https://api.harvardartmuseums.org";
pub const DEFAULT_DB_PATH: &str = "harvard_artifacts.db";
/// The catalog rejects or silently caps larger pages.
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 500;
pub const DEFAULT_TARGET_COUNT: usize = 2500;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

/// Knobs for paginated collection, independent of where records come from.
/// Fields are private so every instance carries a clamped page size.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    page_size: u32,
    page_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
        }
    }
}

impl FetchOptions {
    pub fn new(page_size: u32, page_delay: Duration) -> Self {
        Self {
            page_size: clamp_page_size(page_size),
            page_delay,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_delay(&self) -> Duration {
        self.page_delay
    }
}

pub fn clamp_page_size(requested: u32) -> u32 {
    requested.clamp(1, MAX_PAGE_SIZE)
}

/// Full runtime configuration, resolved from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub db_path: PathBuf,
    pub db_max_connections: u32,
    pub fetch: FetchOptions,
    pub default_target: usize,
    pub http_timeout: Duration,
    pub only_with_images: bool,
}

impl HarvesterConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = env_opt("HARVARD_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        url::Url::parse(&base_url).with_context(|| format!("invalid HARVARD_BASE_URL {base_url}"))?;
        let page_size: u32 = env_parse("HARVEST_PAGE_SIZE", MAX_PAGE_SIZE);
        let delay_ms: u64 = env_parse("HARVEST_PAGE_DELAY_MS", DEFAULT_PAGE_DELAY_MS);
        let timeout_secs: u64 =
            env_parse("HARVEST_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS).clamp(1, 120);

        Ok(Self {
            api_key: env_opt("HARVARD_API_KEY"),
            base_url: base_url.trim_end_matches('/').to_string(),
            db_path: env_opt("HARVEST_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            db_max_connections: env_parse("HARVEST_DB_MAX_CONNS", 4u32).max(1),
            fetch: FetchOptions::new(page_size, Duration::from_millis(delay_ms)),
            default_target: env_parse("HARVEST_TARGET_COUNT", DEFAULT_TARGET_COUNT),
            http_timeout: Duration::from_secs(timeout_secs),
            only_with_images: env_flag("HARVEST_ONLY_WITH_IMAGES", true),
        })
    }

    /// API key, required only for commands that talk to the catalog.
    pub fn require_api_key(&self) -> Result<String> {
        match &self.api_key {
            Some(key) => Ok(key.clone()),
            None => env_req("HARVARD_API_KEY"),
        }
    }
}
