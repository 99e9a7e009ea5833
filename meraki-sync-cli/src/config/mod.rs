//! Configuration layering
//!
//! Built-in defaults, then the TOML file, then environment variables, then
//! command line flags. The resolved [`Settings`] is handed explicitly to the
//! client and the engine.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::{ClientSettings, DEFAULT_BASE_URL};
use crate::api::resilience::{ResilienceConfig, RetryConfig};

const CONFIG_DIR_NAME: &str = "meraki-sync";
const CONFIG_FILE_NAME: &str = "config.toml";
const API_KEY_VARS: &[&str] = &["MERAKI_API_KEY", "meraki_api_key"];
const BASE_URL_VAR: &str = "MERAKI_BASE_URL";

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub verify_tls: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub skip_empty: Option<bool>,
    pub retry: RetrySection,
    pub rate_limit: RateLimitSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitSection {
    pub requests_per_second: Option<u32>,
    pub burst: Option<u32>,
    pub enabled: Option<bool>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration file")
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }
}

/// Values picked up from the process environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            api_key: API_KEY_VARS.iter().find_map(|name| non_empty(name)),
            base_url: non_empty(BASE_URL_VAR),
        }
    }
}

/// Command line flags that override everything else
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub no_verify: bool,
    pub timeout_secs: Option<u64>,
    /// Retries after the first attempt
    pub max_retries: Option<u32>,
    pub concurrency: Option<usize>,
    pub rate_limit: Option<u32>,
    pub deadline_secs: Option<u64>,
    pub skip_empty: bool,
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub verify_tls: bool,
    pub resilience: ResilienceConfig,
    pub deadline: Option<Duration>,
    pub skip_empty: bool,
}

impl Settings {
    /// Merge the layers, lowest precedence first
    pub fn resolve(file: FileConfig, env: EnvConfig, overrides: Overrides) -> Self {
        let defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_attempts: file.retry.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            base_delay: file
                .retry
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: file
                .retry
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            jitter: file.retry.jitter.unwrap_or(defaults.jitter),
            ..defaults
        };

        let mut builder = ResilienceConfig::builder()
            .retry_config(retry)
            .enable_rate_limiting(file.rate_limit.enabled.unwrap_or(true));
        if let Some(retries) = overrides.max_retries {
            builder = builder.max_attempts(retries.saturating_add(1));
        }
        if let Some(rps) = overrides.rate_limit.or(file.rate_limit.requests_per_second) {
            builder = builder.requests_per_second(rps);
        }
        if let Some(burst) = file.rate_limit.burst {
            builder = builder.burst_capacity(burst);
        }
        if let Some(concurrency) = overrides.concurrency.or(file.concurrency) {
            builder = builder.max_concurrent_requests(concurrency);
        }
        if let Some(secs) = overrides.timeout_secs.or(file.timeout_secs) {
            builder = builder.request_timeout(Duration::from_secs(secs.max(1)));
        }

        Self {
            api_key: overrides.api_key.or(env.api_key).or(file.api_key),
            base_url: overrides
                .base_url
                .or(env.base_url)
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            verify_tls: !overrides.no_verify && file.verify_tls.unwrap_or(true),
            resilience: builder.build(),
            deadline: overrides
                .deadline_secs
                .or(file.deadline_secs)
                .map(Duration::from_secs),
            skip_empty: overrides.skip_empty || file.skip_empty.unwrap_or(false),
        }
    }

    /// Read the config file (explicit path, else the default location when it
    /// exists) and the environment, then apply the flags
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => FileConfig::read(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => {
                    debug!("Loading config from {}", path.display());
                    FileConfig::read(&path)?
                }
                _ => FileConfig::default(),
            },
        };
        Ok(Self::resolve(file, EnvConfig::from_env(), overrides))
    }

    /// Connection settings; fails when no API key was configured anywhere
    pub fn client_settings(&self) -> Result<ClientSettings> {
        let api_key = self.api_key.clone().with_context(|| {
            format!(
                "No API key configured. Set {} (or .env), pass --api-key, or add api_key to the config file",
                API_KEY_VARS[0]
            )
        })?;
        Ok(ClientSettings {
            base_url: self.base_url.clone(),
            verify_tls: self.verify_tls,
            ..ClientSettings::new(api_key)
        })
    }

    /// Records allowed in flight at once
    pub fn concurrency(&self) -> usize {
        self.resilience.effective_concurrency()
    }
}

/// `<config_dir>/meraki-sync/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
