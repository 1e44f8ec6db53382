//! Runtime settings
//!
//! Defaults, overridden by an optional JSON settings file, overridden by
//! environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::catalog::UnknownKindPolicy;

const DEFAULT_API_URL: &str = "https://api.soundcloud.com";
const DEFAULT_MOBILE_API_URL: &str = "https://api-mobile.soundcloud.com";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Public application client id sent with every request
    pub client_id: String,
    /// Access token of a signed-in user; obtaining it is up to the host
    pub access_token: Option<String>,
    pub api_url: String,
    pub mobile_api_url: String,
    /// Directory of the durable remote call cache
    pub cache_dir: PathBuf,
    /// Background image attached to every item
    pub fanart: Option<String>,
    pub unknown_kinds: UnknownKindPolicy,
    /// Records per remote page
    pub page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            access_token: None,
            api_url: DEFAULT_API_URL.to_string(),
            mobile_api_url: DEFAULT_MOBILE_API_URL.to_string(),
            cache_dir: default_cache_dir(),
            fanart: None,
            unknown_kinds: UnknownKindPolicy::Skip,
            page_size: 50,
            request_timeout_secs: 30,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("soundnav")
}

/// Location of the optional settings file
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("soundnav").join("settings.json"))
}

impl Settings {
    /// Load settings from the default file (if present) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match default_settings_path() {
            Some(path) if path.exists() => Self::from_json_file(&path)?,
            _ => Self::default(),
        };
        settings.apply_env(|name| env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let settings: Settings =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    /// Apply `SOUNDNAV_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SOUNDNAV_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = lookup("SOUNDNAV_ACCESS_TOKEN") {
            self.access_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Some(v) = lookup("SOUNDNAV_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = lookup("SOUNDNAV_MOBILE_API_URL") {
            self.mobile_api_url = v;
        }
        if let Some(v) = lookup("SOUNDNAV_CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SOUNDNAV_FANART") {
            self.fanart = Some(v).filter(|f| !f.is_empty());
        }
        if let Some(v) = lookup("SOUNDNAV_UNKNOWN_KINDS") {
            self.unknown_kinds = match v.to_ascii_lowercase().as_str() {
                "skip" => UnknownKindPolicy::Skip,
                "fail" => UnknownKindPolicy::Fail,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "SOUNDNAV_UNKNOWN_KINDS must be 'skip' or 'fail', got '{}'",
                        other
                    )))
                }
            };
        }
        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.is_empty() || self.mobile_api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "API URLs must not be empty".to_string(),
            ));
        }
        if !(1..=200).contains(&self.page_size) {
            return Err(ConfigError::ValidationError(format!(
                "page_size must be between 1 and 200, got {}",
                self.page_size
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
