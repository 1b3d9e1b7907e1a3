//! Configuration for the index service
//!
//! Loaded from an optional TOML file, every field falls back to its default:
//!
//! ```toml
//! source_url = "https://mleuv.brandenburg.de/mleuv/de/wgs.xml"
//! cache_path = "/var/cache/wbi/wgs_cache.xml"
//! cache_ttl_secs = 10800
//! request_timeout_secs = 30
//! default_district = "Märkisch-Oderland"
//! ```

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Published forest fire danger index for Brandenburg
pub const DEFAULT_SOURCE_URL: &str = "https://mleuv.brandenburg.de/mleuv/de/wgs.xml";

/// Cache expiration (3 hours)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3 * 60 * 60;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_DISTRICT: &str = "Märkisch-Oderland";

const CACHE_FILE_NAME: &str = "wgs_cache.xml";

/// Default cache file location: `<platform cache dir>/wbi/wgs_cache.xml`
///
/// Falls back to `./.cache/wgs_cache.xml` when the platform has no cache dir.
pub fn default_cache_path() -> PathBuf {
    match dirs::cache_dir() {
        Some(dir) => dir.join("wbi").join(CACHE_FILE_NAME),
        None => PathBuf::from(".cache").join(CACHE_FILE_NAME),
    }
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    format!("wbi/{} (+{})", env!("CARGO_PKG_VERSION"), env!("CARGO_PKG_REPOSITORY"))
}

fn default_district() -> String {
    DEFAULT_DISTRICT.to_string()
}

/// Index service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// URL of the XML document
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Where the last fetched document is kept
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Cached document age after which it is refetched
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Transport timeout for a single fetch
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// District shown when a consumer does not pick one
    #[serde(default = "default_district")]
    pub default_district: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            cache_path: default_cache_path(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            default_district: default_district(),
        }
    }
}

impl IndexConfig {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(CoreError::ConfigRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        Self::from_toml_str(&content).map_err(|message| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject values the service cannot work with
    pub fn validate(&self) -> Result<(), CoreError> {
        let url = reqwest::Url::parse(&self.source_url).map_err(|e| CoreError::InvalidConfig {
            message: format!("source_url '{}' is not a valid URL: {}", self.source_url, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::InvalidConfig {
                message: format!("source_url must be http or https, got '{}'", url.scheme()),
            });
        }

        if self.cache_path.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "cache_path must not be empty".to_string(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
