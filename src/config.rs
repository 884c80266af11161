use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ProxyError;
use crate::Result;

pub const DEFAULT_CONFIG_PATH: &str = "/app/config.yaml";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Maps public aliases to upstream calendar URLs, plus the cache TTL.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub mappings: HashMap<String, String>,
    pub cache_ttl: Option<String>,
}

impl Config {
    /// Loads the config from the file named by `CONFIG_PATH`, falling back
    /// to the well-known default path.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(&path)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProxyError::Config(format!("failed to read {}: {}", path, e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ProxyError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.mappings.is_empty() {
            return Err(ProxyError::Config("config contains no mappings".into()));
        }
        for (alias, url) in &self.mappings {
            if alias.is_empty() {
                return Err(ProxyError::Config("empty alias in mappings".into()));
            }
            Url::parse(url).map_err(|e| {
                ProxyError::Config(format!("invalid URL for alias {}: {}", alias, e))
            })?;
        }
        // Surface a malformed TTL at load time rather than first use.
        self.ttl()?;
        Ok(())
    }

    /// The cache TTL in effect: the parsed `cache_ttl` string (humantime
    /// syntax, e.g. "30m") or the 30 minute default when absent.
    pub fn ttl(&self) -> Result<Duration> {
        match &self.cache_ttl {
            Some(raw) => humantime::parse_duration(raw)
                .map_err(|e| ProxyError::Config(format!("invalid cache_ttl {:?}: {}", raw, e))),
            None => Ok(DEFAULT_CACHE_TTL),
        }
    }
}

/// The listen address from `BIND_ADDRESS`, defaulting to the local port.
pub fn bind_address() -> Result<SocketAddr> {
    let raw = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    raw.parse()
        .map_err(|e| ProxyError::Config(format!("invalid bind address {:?}: {}", raw, e)))
}
