//! Application configuration, persisted as JSON.
//!
//! Every field has a default, so a partial file (or no file at all) is
//! fine. Command-line flags are applied on top by the binary.

use crate::driver::DriverConfig;
use crate::error::{Error, Result};
use crate::transport::{DEFAULT_DEVICE, DEFAULT_SPEED_HZ, MIN_SPEED_HZ};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8010;

/// Which SPI device to open and how fast to clock it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub device: PathBuf,
    pub speed_hz: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            speed_hz: DEFAULT_SPEED_HZ,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bus: BusConfig,
    pub driver: DriverConfig,
    /// HTTP port of the control server.
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            driver: DriverConfig::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Read `path`. A missing file yields the defaults; a malformed one is
    /// an error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config: Self = serde_json::from_str(&text).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text = serde_json::to_string_pretty(self).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        text.push('\n');
        fs::write(path, text).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.bus.speed_hz < MIN_SPEED_HZ {
            return Err(Error::InvalidSpeed(self.bus.speed_hz));
        }
        self.driver.validate()
    }
}
