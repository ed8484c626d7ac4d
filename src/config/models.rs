//! Configuration data models
//!
//! This module defines the data structures used for application configuration.
//! Every section defaults field by field, so a partial `config.json` is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logical pin names
    pub pins: PinConfig,
    /// Peripheral backend selection
    pub backend: BackendConfig,
    /// Indicator image names
    pub indicator: IndicatorConfig,
    /// Peripheral I/O bounds
    pub io: IoConfig,
}

/// Logical pins used by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// Output pin driving the LED
    pub led: String,
    /// Active-low input pin wired to the pushbutton
    pub button: String,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            led: "GPIO_37".to_string(),
            button: "GPIO_32".to_string(),
        }
    }
}

/// Which peripheral service implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Linux sysfs GPIO
    Sysfs,
    /// In-memory board driven from the command line
    #[default]
    Simulated,
}

/// Peripheral backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend implementation
    pub kind: BackendKind,
    /// Root of the sysfs GPIO tree
    pub sysfs_root: PathBuf,
    /// Edge watcher polling interval in milliseconds (1-1000)
    pub poll_interval_ms: u64,
    /// Explicit pin name → sysfs number table
    pub pin_numbers: BTreeMap<String, u32>,
}

impl BackendConfig {
    /// Polling interval clamped to 1-1000 ms
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(1, 1000))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            sysfs_root: PathBuf::from(crate::gpio::sysfs::DEFAULT_SYSFS_ROOT),
            poll_interval_ms: 10,
            pin_numbers: BTreeMap::new(),
        }
    }
}

/// Where indicator frames are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorSink {
    /// Printed to stdout by a render thread
    #[default]
    Stdout,
    /// Written to the log only, for headless runs
    Log,
}

/// Indicator output and image resource names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Frame destination
    pub sink: IndicatorSink,
    /// Image shown while the LED is lit
    pub on_image: String,
    /// Image shown while the LED is dark
    pub off_image: String,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sink: IndicatorSink::Stdout,
            on_image: "led_on".to_string(),
            off_image: "led_off".to_string(),
        }
    }
}

/// Bounds on peripheral calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Peripheral calls slower than this are logged as warnings
    pub slow_call_warn_ms: u64,
}

impl IoConfig {
    /// Slow-call threshold as a `Duration`
    pub fn slow_call_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_call_warn_ms)
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            slow_call_warn_ms: 5,
        }
    }
}
