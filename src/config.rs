use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "daangn-scout.toml";

/// Application settings.
///
/// Layered as built-in defaults, then an optional TOML file, then
/// `SCOUT__`-prefixed environment variables (`SCOUT__HTTP__TIMEOUT_SECS=10`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub resolver: ResolverConfig,
    pub search: SearchConfig,
    pub files: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub endpoint: String,
    pub route_data: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.daangn.com/kr/buy-sell/".to_string(),
            route_data: "routes/kr.buy-sell._index".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 30,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Timings and selectors of the browser-driven region resolver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    pub start_url: String,
    pub location_button: String,
    pub input_selector: String,
    pub submit_selector: String,
    pub result_selector: String,
    pub headless: bool,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    /// Pause after typing, before submitting
    pub type_delay_ms: u64,
    /// Pause after clearing the input between queries
    pub settle_delay_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            start_url: "https://www.daangn.com/kr/".to_string(),
            location_button: "button[data-gtm='gnb_location']".to_string(),
            input_selector: "input[aria-label='Search input']".to_string(),
            submit_selector: "button[type='submit'][aria-label='Search']".to_string(),
            result_selector: "section ul li a".to_string(),
            headless: true,
            poll_interval_ms: 3_000,
            poll_timeout_ms: 5_000,
            type_delay_ms: 200,
            settle_delay_ms: 3_000,
        }
    }
}

impl ResolverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Worker pool size of the concurrent mode
    pub concurrency: usize,
    pub per_page: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { concurrency: 10, per_page: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub address_table: PathBuf,
    pub queries: PathBuf,
    pub region_codes: PathBuf,
    pub results: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            address_table: PathBuf::from("address.tsv"),
            queries: PathBuf::from("address_unique.csv"),
            region_codes: PathBuf::from("address_with_all_codes.csv"),
            results: PathBuf::from("results.csv"),
        }
    }
}

/// Load settings. An explicitly given file must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let (file, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    // Missing keys fall back to the serde defaults above
    let settings = Config::builder()
        .add_source(File::from(file.as_path()).required(required))
        .add_source(Environment::with_prefix("SCOUT").separator("__"))
        .build()
        .with_context(|| format!("Failed to load config from {}", file.display()))?;

    if file.exists() {
        info!("Loaded config (file: {})", file.display());
    } else {
        info!("No {} found, using defaults", file.display());
    }

    settings
        .try_deserialize::<AppConfig>()
        .context("Failed to deserialize config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_marketplace() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.search.concurrency, 10);
        assert_eq!(cfg.resolver.poll_interval(), Duration::from_secs(3));
        assert_eq!(cfg.resolver.poll_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.http.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.files.region_codes, PathBuf::from("address_with_all_codes.csv"));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.toml");
        std::fs::write(
            &path,
            "[search]\nconcurrency = 4\n\n[resolver]\npoll_timeout_ms = 8000\n",
        )
        .unwrap();

        let cfg = load_config(Some(path.as_path())).unwrap();
        assert_eq!(cfg.search.concurrency, 4);
        assert_eq!(cfg.search.per_page, 10);
        assert_eq!(cfg.resolver.poll_timeout_ms, 8000);
        assert_eq!(cfg.resolver.poll_interval_ms, 3000);
    }

    #[test]
    fn missing_default_file_falls_back_to_defaults() {
        // The crate root carries no daangn-scout.toml
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.search.per_page, 10);
        assert_eq!(cfg.files.results, PathBuf::from("results.csv"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("nope.toml").as_path())).is_err());
    }
}
