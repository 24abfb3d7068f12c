use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CaptureError, Result};

pub const DEFAULT_FLUSH_EVERY_LINES: usize = 256;

/// One configured device slot. Its position in `CaptureConfig::devices` is the channel index.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory the per-channel CSV files land in. Created on activation.
    pub output_dir: PathBuf,
    /// Scene or session identifier used as the filename prefix.
    /// A random id is generated when this is left empty.
    pub session_id: Option<String>,
    pub flush_every_lines: usize,
    pub idle_poll_ms: u64,
    pub join_timeout_ms: u64,
    /// Cadence of the demo tick driver. The library itself never schedules ticks.
    pub tick_hz: u32,
    pub devices: Vec<DeviceConfig>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("HapticLogs"),
            session_id: None,
            flush_every_lines: DEFAULT_FLUSH_EVERY_LINES,
            idle_poll_ms: 1,
            join_timeout_ms: 500,
            tick_hz: 500,
            devices: vec![DeviceConfig {
                label: "left_device".to_string(),
            }],
        }
    }
}

impl CaptureConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CaptureError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CaptureConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_every_lines == 0 {
            return Err(CaptureError::Config("flush_every_lines must be at least 1".into()));
        }
        if self.devices.is_empty() {
            return Err(CaptureError::Config("at least one device must be configured".into()));
        }
        if self.tick_hz == 0 || self.tick_hz > 1000 {
            return Err(CaptureError::Config(format!(
                "tick_hz must be within 1..=1000, got {}",
                self.tick_hz
            )));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.label.trim().is_empty() {
                return Err(CaptureError::Config("device label must not be empty".into()));
            }
            if !seen.insert(device.label.as_str()) {
                return Err(CaptureError::Config(format!(
                    "duplicate device label '{}'",
                    device.label
                )));
            }
        }
        Ok(())
    }

    /// Resolves the filename prefix, generating one if none was configured.
    pub fn resolve_session_id(&self) -> String {
        match self.session_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms.max(1))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz.max(1) as f64)
    }
}
