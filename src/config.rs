use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Public base URL, used for links in generated feeds
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Minutes between scheduled crawls
    #[serde(default = "default_crawl_interval")]
    pub crawl_interval: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_crawl_interval() -> u64 {
    360
}

fn default_user_agent() -> String {
    "strips/0.1 (comic aggregator)".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            site_url: default_site_url(),
            crawl_interval: default_crawl_interval(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a config file, falling back to defaults if it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
