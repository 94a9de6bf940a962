use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::blacklist::Blacklist;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding uploaded PDF bytes, one `<id>.pdf` per document.
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
        }
    }
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("./data/pdfs")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BlacklistConfig {
    /// Newline-delimited regex fragments. No file means nothing is blacklisted.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://robustlinks.mementoweb.org/api/".to_string()
}
fn default_concurrency() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Config {
    /// Read and compile the configured blacklist.
    pub fn load_blacklist(&self) -> Result<Blacklist> {
        match &self.blacklist.path {
            Some(path) => Blacklist::load(path)
                .with_context(|| format!("Failed to load blacklist: {}", path.display())),
            None => Ok(Blacklist::empty()),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate archive
    if config.archive.concurrency == 0 {
        anyhow::bail!("archive.concurrency must be >= 1");
    }
    if config.archive.timeout_secs == 0 {
        anyhow::bail!("archive.timeout_secs must be >= 1");
    }
    let endpoint = url::Url::parse(&config.archive.endpoint)
        .with_context(|| format!("archive.endpoint is not a URL: {}", config.archive.endpoint))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        anyhow::bail!("archive.endpoint must be http or https");
    }

    // Validate server
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}
