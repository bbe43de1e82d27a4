use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a link-fixing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixerConfig {
    /// Site the broken links belong to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Catalogue of pages and their broken links
    #[serde(default = "default_catalogue_path")]
    pub catalogue_path: PathBuf,

    /// Directory the page paths in the catalogue are relative to
    #[serde(default = "default_docs_root")]
    pub docs_root: PathBuf,

    /// Where the JSON report is written
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Maximum number of concurrent browser sessions
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Timeout for each redirect probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Maximum time to wait for `document.readyState == "complete"`
    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,

    /// Extra delay after a page reports ready, for client-side rendering
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// How long to watch for navigation after a click
    #[serde(default = "default_click_wait_secs")]
    pub click_wait_secs: u64,

    /// Number of scored candidates tried by click navigation
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Regex patterns for candidate hrefs that are never clicked
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Join catalogue lines that were wrapped by the tool that produced them
    #[serde(default)]
    pub repair_wrapped_lines: bool,

    /// Prefixes that always start a new catalogue line during repair
    #[serde(default = "default_page_prefixes")]
    pub page_prefixes: Vec<String>,
}

fn default_base_url() -> String {
    "https://docs.wandb.ai".to_string()
}

fn default_catalogue_path() -> PathBuf {
    PathBuf::from("broken.mdx")
}

fn default_docs_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("broken_links_report.json")
}

/// Default value for max_workers
fn default_max_workers() -> usize {
    15
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_page_load_timeout_secs() -> u64 {
    10
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_click_wait_secs() -> u64 {
    5
}

fn default_candidate_limit() -> usize {
    3
}

fn default_exclude_patterns() -> Vec<String> {
    vec![r"\.(jpg|jpeg|png|gif|css|js|ico|svg|woff|woff2|ttf|eot|pdf)$".to_string()]
}

fn default_page_prefixes() -> Vec<String> {
    vec!["guides/".to_string()]
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            catalogue_path: default_catalogue_path(),
            docs_root: default_docs_root(),
            output_path: default_output_path(),
            max_workers: default_max_workers(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            probe_timeout_secs: default_probe_timeout_secs(),
            page_load_timeout_secs: default_page_load_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            click_wait_secs: default_click_wait_secs(),
            candidate_limit: default_candidate_limit(),
            exclude_patterns: default_exclude_patterns(),
            repair_wrapped_lines: false,
            page_prefixes: default_page_prefixes(),
        }
    }
}

impl FixerConfig {
    /// Create a new configuration for the given site with default values
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut contents = String::new();
        File::open(path)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if set
    pub fn apply_env(&mut self) {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn click_wait(&self) -> Duration {
        Duration::from_secs(self.click_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = FixerConfig::from_json("{}").unwrap();
        assert_eq!(config.base_url, "https://docs.wandb.ai");
        assert_eq!(config.catalogue_path, PathBuf::from("broken.mdx"));
        assert_eq!(config.max_workers, 15);
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert_eq!(config.candidate_limit, 3);
        assert!(!config.repair_wrapped_lines);
        assert_eq!(config.click_wait(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config =
            FixerConfig::from_json(r#"{"base_url": "https://x.io", "max_workers": 2}"#).unwrap();
        assert_eq!(config.base_url, "https://x.io");
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.page_load_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = FixerConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = FixerConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
