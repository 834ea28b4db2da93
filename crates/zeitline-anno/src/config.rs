//! Scrape run configuration

use std::path::PathBuf;
use std::time::Duration;

use zeitline_core::{ProxyIdentity, RetryPolicy};

/// Runtime configuration for one scraping run.
///
/// Everything here arrives from the CLI / config file at process
/// start; nothing is hard-coded in the pipeline itself.
#[derive(Debug)]
pub struct Config {
    /// Issue list CSV (`aid,title,date`)
    pub issues_path: PathBuf,
    /// Directory for output shards, checkpoints, and failure logs
    pub output_dir: PathBuf,
    pub base_url: String,
    pub workers: usize,
    /// Upper bound on pages probed per issue
    pub max_pages: u32,
    /// Process only the first N issues (for testing)
    pub max_issues: Option<usize>,
    /// Minimum spacing between requests per proxy identity
    pub request_interval: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub proxies: Vec<ProxyIdentity>,
    /// Consecutive failures before an identity is retired
    pub retire_after: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issues_path: PathBuf::from("issues.csv"),
            output_dir: PathBuf::from("backups"),
            base_url: "https://anno.onb.ac.at".to_string(),
            workers: 12,
            max_pages: 100,
            max_issues: None,
            request_interval: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0".to_string(),
            retry: RetryPolicy::default(),
            proxies: Vec::new(),
            retire_after: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.base_url.starts_with("https://"));
        assert_eq!(config.max_pages, 100);
        assert!(config.workers >= 1);
        assert!(config.proxies.is_empty());
    }
}
