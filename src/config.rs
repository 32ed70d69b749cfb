//! Config loading for the channel layer.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Transience;
use crate::transport::AddrFamily;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: ChannelLimits,
    pub transport: TransportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: ChannelLimits::default(),
            transport: TransportConfig::default(),
        }
    }
}

/// Bounds on the application-facing dispatch edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelLimits {
    pub max_subscribers: usize,
    pub subscriber_queue_events: usize,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            max_subscribers: 32,
            subscriber_queue_events: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub prefer: AddrFamily,
    pub connect_timeout_ms: Option<u64>,
    pub receive_timeout_ms: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            prefer: AddrFamily::V4,
            connect_timeout_ms: Some(5_000),
            receive_timeout_ms: None,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout_ms.map(Duration::from_millis)
    }
}

pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, path)
}

fn load_from_str(contents: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }
}
