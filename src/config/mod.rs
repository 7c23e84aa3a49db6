use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use crate::api::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::api::types::SearchFilters;
use crate::crawl::RunConfig;
use crate::error::{HarvestError, Result};
use crate::store::{store_path, StoreKind};

const CONFIG_DIR_NAME: &str = ".vozcivica";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Overrides the configuration directory (mainly for tests and CI).
pub const CONFIG_DIR_ENV: &str = "VOZCIVICA_HOME";
/// Fallback for `summary.key`.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Keys accepted by `config set` / `config get`.
pub const KEYS: &[&str] = &[
    "crawl.category",
    "crawl.status",
    "crawl.max_pages",
    "crawl.page_delay_ms",
    "crawl.record_delay_ms",
    "crawl.max_page_failures",
    "crawl.download_documents",
    "http.base_url",
    "http.timeout_secs",
    "http.max_retries",
    "http.retry_base_delay_ms",
    "http.user_agent",
    "storage.backend",
    "storage.data_dir",
    "storage.flush_every",
    "summary.key",
    "summary.model",
    "summary.base_url",
    "summary.timeout_secs",
];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Bill type searched for and required in result headings
    pub category: String,
    /// Progress filter (`todos` for every status)
    pub status: String,
    pub max_pages: u32,
    pub page_delay_ms: u64,
    pub record_delay_ms: u64,
    pub max_page_failures: u32,
    pub download_documents: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        let filters = SearchFilters::default();
        Self {
            category: filters.category,
            status: filters.status,
            max_pages: 10,
            page_delay_ms: 500,
            record_delay_ms: 200,
            max_page_failures: 3,
            download_documents: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StoreKind,
    /// Holds the store file and the `pdfs/` tree
    pub data_dir: PathBuf,
    /// Snapshot backend: commits between flushes
    pub flush_every: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::Json,
            data_dir: PathBuf::from("data"),
            flush_every: 10,
        }
    }
}

impl StorageConfig {
    pub fn store_path(&self) -> PathBuf {
        store_path(self.backend, &self.data_dir)
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("pdfs")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HarvestError::Config(format!("Invalid value for {}: '{}'", key, value)))
}

fn parse_timeout(key: &str, value: &str) -> Result<u64> {
    match parse_value(key, value)? {
        0 => Err(HarvestError::Config(format!("Invalid value for {}: must be greater than 0", key))),
        secs => Ok(secs),
    }
}

fn write_private(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)
        .map_err(|e| HarvestError::Config(format!("Failed to write config file: {}", e)))?;

    // Set file permissions to 0600 on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, permissions)
            .map_err(|e| HarvestError::Config(format!("Failed to set file permissions: {}", e)))?;
    }
    Ok(())
}

impl Config {
    /// Get the configuration directory
    pub fn config_path() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let home_dir = dirs::home_dir()
            .ok_or_else(|| HarvestError::Config("Could not determine home directory".to_string()))?;

        Ok(home_dir.join(CONFIG_DIR_NAME))
    }

    /// Get the configuration file full path
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_path()?.join(CONFIG_FILE_NAME))
    }

    /// Initialize configuration directory and file
    pub fn initialize() -> Result<()> {
        let config_dir = Self::config_path()?;

        // Create config directory with restricted permissions
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| HarvestError::Config(format!("Failed to create config directory: {}", e)))?;

            // Set directory permissions to 0700 on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let permissions = fs::Permissions::from_mode(0o700);
                fs::set_permissions(&config_dir, permissions)
                    .map_err(|e| HarvestError::Config(format!("Failed to set directory permissions: {}", e)))?;
            }
        }

        let config_file = Self::config_file_path()?;
        if !config_file.exists() {
            Self::default().save_to(&config_file)?;
        }

        Ok(())
    }

    /// Load configuration from the default location, creating it if needed
    pub fn load() -> Result<Self> {
        Self::initialize()?;
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load configuration from an explicit file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| HarvestError::Config(format!("Failed to read config file: {}", e)))?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&contents)
            .map_err(|e| HarvestError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        Self::initialize()?;
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| HarvestError::Config(format!("Failed to serialize config: {}", e)))?;
        write_private(path, &yaml)
    }

    /// Gemini key from the file, else from `GEMINI_API_KEY`
    pub fn summary_api_key(&self) -> Option<String> {
        self.summary
            .key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.http.base_url.clone(),
            // a hand-edited 0 would fail every request
            timeout: self.http.timeout_secs.max(1),
            max_retries: self.http.max_retries,
            retry_base_delay: self.http.retry_base_delay_ms,
            user_agent: self.http.user_agent.clone(),
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            filters: SearchFilters {
                category: self.crawl.category.clone(),
                status: self.crawl.status.clone(),
            },
            max_pages: self.crawl.max_pages,
            page_delay: Duration::from_millis(self.crawl.page_delay_ms),
            record_delay: Duration::from_millis(self.crawl.record_delay_ms),
            max_page_failures: self.crawl.max_page_failures,
            download_documents: self.crawl.download_documents,
            documents_dir: self.storage.documents_dir(),
        }
    }

    /// Set a configuration value by dotted key path
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "crawl.category" => self.crawl.category = value.trim().to_uppercase(),
            "crawl.status" => self.crawl.status = value.trim().to_string(),
            "crawl.max_pages" => self.crawl.max_pages = parse_value(key, value)?,
            "crawl.page_delay_ms" => self.crawl.page_delay_ms = parse_value(key, value)?,
            "crawl.record_delay_ms" => self.crawl.record_delay_ms = parse_value(key, value)?,
            "crawl.max_page_failures" => self.crawl.max_page_failures = parse_value(key, value)?,
            "crawl.download_documents" => self.crawl.download_documents = parse_value(key, value)?,
            "http.base_url" => {
                url::Url::parse(value.trim())
                    .map_err(|e| HarvestError::Config(format!("Invalid value for {}: {}", key, e)))?;
                self.http.base_url = value.trim().to_string();
            }
            "http.timeout_secs" => self.http.timeout_secs = parse_timeout(key, value)?,
            "http.max_retries" => self.http.max_retries = parse_value(key, value)?,
            "http.retry_base_delay_ms" => self.http.retry_base_delay_ms = parse_value(key, value)?,
            "http.user_agent" => self.http.user_agent = value.to_string(),
            "storage.backend" => self.storage.backend = value.parse()?,
            "storage.data_dir" => self.storage.data_dir = PathBuf::from(value.trim()),
            "storage.flush_every" => self.storage.flush_every = parse_value(key, value)?,
            "summary.key" => self.summary.key = Some(value.trim().to_string()),
            "summary.model" => self.summary.model = value.trim().to_string(),
            "summary.base_url" => self.summary.base_url = value.trim().to_string(),
            "summary.timeout_secs" => self.summary.timeout_secs = parse_timeout(key, value)?,
            _ => {
                return Err(HarvestError::Config(format!("Unknown configuration key: {}", key)));
            }
        }
        Ok(())
    }

    /// Get a configuration value by dotted key path
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "crawl.category" => Some(self.crawl.category.clone()),
            "crawl.status" => Some(self.crawl.status.clone()),
            "crawl.max_pages" => Some(self.crawl.max_pages.to_string()),
            "crawl.page_delay_ms" => Some(self.crawl.page_delay_ms.to_string()),
            "crawl.record_delay_ms" => Some(self.crawl.record_delay_ms.to_string()),
            "crawl.max_page_failures" => Some(self.crawl.max_page_failures.to_string()),
            "crawl.download_documents" => Some(self.crawl.download_documents.to_string()),
            "http.base_url" => Some(self.http.base_url.clone()),
            "http.timeout_secs" => Some(self.http.timeout_secs.to_string()),
            "http.max_retries" => Some(self.http.max_retries.to_string()),
            "http.retry_base_delay_ms" => Some(self.http.retry_base_delay_ms.to_string()),
            "http.user_agent" => Some(self.http.user_agent.clone()),
            "storage.backend" => Some(self.storage.backend.to_string()),
            "storage.data_dir" => Some(self.storage.data_dir.display().to_string()),
            "storage.flush_every" => Some(self.storage.flush_every.to_string()),
            "summary.key" => self.summary.key.clone(),
            "summary.model" => Some(self.summary.model.clone()),
            "summary.base_url" => Some(self.summary.base_url.clone()),
            "summary.timeout_secs" => Some(self.summary.timeout_secs.to_string()),
            _ => None,
        }
    }
}
