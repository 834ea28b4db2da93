//! Configuration loading from TOML files

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use zeitline_core::{ProxyIdentity, RetryPolicy};

/// Global configuration for zeitline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub scrape: ScrapeConfig,
    pub retry: RetryConfig,
    pub proxy: ProxyConfig,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("./backups"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub base_url: String,
    /// Pages probed per issue before moving on
    pub max_pages: u32,
    /// Minimum milliseconds between requests per proxy identity
    pub request_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://anno.onb.ac.at".to_string(),
            max_pages: 100,
            request_interval_ms: 500,
            connect_timeout_secs: 30,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_secs: policy.base.as_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base: Duration::from_secs(self.base_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy URLs, e.g. `http://gateway.example.net:8080`
    pub urls: Vec<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub password: Option<String>,
    /// Consecutive failures before an identity is retired
    pub retire_after: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            username: std::env::var("ZEITLINE_PROXY_USER").ok(),
            password: std::env::var("ZEITLINE_PROXY_PASS").ok(),
            retire_after: 5,
        }
    }
}

impl ProxyConfig {
    /// Identities for the rotator, one per configured URL.
    pub fn identities(&self) -> Vec<ProxyIdentity> {
        self.urls
            .iter()
            .enumerate()
            .map(|(id, url)| ProxyIdentity {
                id,
                url: Some(url.clone()),
                username: self.username.clone(),
                password: self.password.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
    pub max: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            default: cpus.min(12),
            max: 32,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./zeitline.toml (current directory)
    /// 2. ~/.config/zeitline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("zeitline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "zeitline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.output.default_dir, PathBuf::from("./backups"));
        assert_eq!(config.scrape.max_pages, 100);
        assert!(config.workers.default >= 1);
        assert!(config.proxy.urls.is_empty());
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[output]
default_dir = "/tmp/data"

[scrape]
max_pages = 50
request_interval_ms = 250

[retry]
max_attempts = 6
base_secs = 1

[proxy]
urls = ["http://gw1.example.net:8080", "http://gw2.example.net:8080"]
retire_after = 3

[workers]
default = 4
max = 8
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.output.default_dir, PathBuf::from("/tmp/data"));
        assert_eq!(config.scrape.max_pages, 50);
        assert_eq!(config.retry.policy().max_attempts, 6);
        assert_eq!(config.proxy.identities().len(), 2);
        assert_eq!(config.proxy.identities()[1].id, 1);
        assert_eq!(config.proxy.retire_after, 3);
        assert_eq!(config.workers.default, 4);
    }
}
