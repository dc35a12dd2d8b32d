//! Driver settings and their TOML representation.

use crate::base::{Error, Result};
use crate::internals::*;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Everything the acquisition session needs to know besides the device itself.
///
/// Missing keys take their defaults; unknown keys are rejected.
///
/// ```toml
/// host = "10.0.0.5"
/// frame_id = "front_laser"
/// use_hw_time = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub host: String,
    pub port: u16,
    pub frame_id: String,
    /// Timestamp frames from the device clock instead of the arrival time.
    pub use_hw_time: bool,
    pub range_min: f32,
    pub range_max: f32,
    pub backoff_ms: u64,
    pub settle_ms: u64,
    /// Status queries after the settle delay before the session gives up.
    pub ready_attempts: u32,
    pub read_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            host: LMS_DEFAULT_HOST.to_owned(),
            port: LMS_DEFAULT_PORT,
            frame_id: "laser".to_owned(),
            use_hw_time: false,
            range_min: LMS_DEFAULT_RANGE_MIN,
            range_max: LMS_DEFAULT_RANGE_MAX,
            backoff_ms: LMS_DEFAULT_BACKOFF.as_millis() as u64,
            settle_ms: LMS_DEFAULT_SETTLE_DELAY.as_millis() as u64,
            ready_attempts: 1,
            read_timeout_ms: LMS_DEFAULT_READ_TIMEOUT.as_millis() as u64,
            request_timeout_ms: LMS_DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: LMS_DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl DriverConfig {
    /// Loads a configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<DriverConfig> {
        let path = path.as_ref();
        debug!("Loading driver configuration from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_owned(),
            description: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| Error::Config {
            path: path.to_owned(),
            description: e.to_string(),
        })
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
