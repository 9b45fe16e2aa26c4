//! Image cache configuration.
//!
//! Persisted as JSON. Missing fields fall back to their defaults so that a
//! config written by an older build keeps loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::Size;
use crate::{Error, Result};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum bubble edge for image messages.
const DEFAULT_MAX_BUBBLE_EDGE: f32 = 150.0;

/// Directory under the platform cache dir where images are stored.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chatcell")
        .join("images")
}

/// Config file location under the platform config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatcell").join("config.json"))
}

fn default_user_agent() -> String {
    format!("chatcell/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings for image resolution and download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory where downloaded images are written.
    pub cache_dir: PathBuf,
    /// Whole-request timeout for remote fetches, in seconds.
    pub request_timeout_secs: u64,
    /// User agent sent with remote fetches.
    pub user_agent: String,
    /// Largest on-screen size of an image bubble.
    pub max_bubble_size: Size,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
            max_bubble_size: Size::new(DEFAULT_MAX_BUBBLE_EDGE, DEFAULT_MAX_BUBBLE_EDGE),
        }
    }
}

impl CacheConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load the configuration from `path`, or defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the loaded values are invalid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        if self.max_bubble_size.is_empty() {
            return Err(Error::Config("max_bubble_size must be non-zero".into()));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("cache_dir must not be empty".into()));
        }
        Ok(())
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Clone)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
        }
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    /// Sets the request timeout, rounded down to whole seconds.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Sets the maximum bubble size.
    #[must_use]
    pub const fn max_bubble_size(mut self, size: Size) -> Self {
        self.config.max_bubble_size = size;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> CacheConfig {
        self.config
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
