use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR_NAME: &str = "songseed";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "cache.db";

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const CACHE_TTL_SECONDS: u64 = 86400; // 24 hours
pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY_MS: u64 = 1000;
pub const DESIRED_COUNT: usize = 30;
pub const MAX_SEED_TRACKS: usize = 20;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_DATABASE: &str = "SONGSEED_DATABASE";
pub const ENV_CACHE_TTL: &str = "SONGSEED_CACHE_TTL";

pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn get_config_file_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE_NAME)
}

pub fn get_default_database_path() -> PathBuf {
    get_config_dir().join(DATABASE_FILE_NAME)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub database_path: PathBuf,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub desired_count: usize,
    pub max_seed_tracks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECONDS,
            cache_ttl_secs: CACHE_TTL_SECONDS,
            database_path: get_default_database_path(),
            max_attempts: MAX_ATTEMPTS,
            retry_delay_ms: RETRY_DELAY_MS,
            desired_count: DESIRED_COUNT,
            max_seed_tracks: MAX_SEED_TRACKS,
        }
    }
}

impl Config {
    /// Read the config file, then apply environment overrides.
    ///
    /// With no explicit `path`, a missing default file yields defaults. An
    /// explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = get_config_file_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    log::debug!("No config file at {:?}, using defaults", default_path);
                    Self::default()
                }
            }
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {:?}: {}", path, e))?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.gemini_api_key = Some(key);
        }

        if let Some(path) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }

        if let Some(ttl) = lookup(ENV_CACHE_TTL) {
            match ttl.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.cache_ttl_secs = secs,
                _ => log::warn!("Ignoring invalid {}='{}'", ENV_CACHE_TTL, ttl),
            }
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
