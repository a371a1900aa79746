//! Configuration types for termdeck.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Error, SplitDirection};

/// Deck configuration loaded from YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeckConfig {
    /// Session lifecycle settings
    pub sessions: SessionSettings,
    /// Message channel settings
    pub channel: ChannelSettings,
    /// Split layout settings
    pub layout: LayoutSettings,
    /// Scrollback settings
    pub scrollback: ScrollbackSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl DeckConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: DeckConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.sessions.max_sessions == 0 {
            return Err(Error::Config("sessions.max_sessions must be > 0".into()));
        }

        if self.channel.max_queue_size < HIGH_PRIORITY_FLOOR {
            return Err(Error::Config(format!(
                "channel.max_queue_size must be >= {}",
                HIGH_PRIORITY_FLOOR
            )));
        }

        if self.layout.min_pane_height == 0 {
            return Err(Error::Config("layout.min_pane_height must be > 0".into()));
        }

        let ratio = self.layout.wide_aspect_ratio;
        if ratio.is_nan() || ratio <= 0.0 {
            return Err(Error::Config(
                "layout.wide_aspect_ratio must be positive".into(),
            ));
        }

        if self.scrollback.max_lines == 0 {
            return Err(Error::Config("scrollback.max_lines must be > 0".into()));
        }

        Ok(())
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum number of live sessions (slots are 1..=max_sessions)
    pub max_sessions: usize,
    /// How long a delete stays in flight without host confirmation
    pub deletion_timeout_ms: u64,
    /// How long a creation may wait for a slot
    pub creation_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: 5,
            deletion_timeout_ms: 5000,
            creation_timeout_ms: 10000,
        }
    }
}

impl SessionSettings {
    /// Deletion expiry window.
    pub fn deletion_timeout(&self) -> Duration {
        Duration::from_millis(self.deletion_timeout_ms)
    }

    /// Pending creation expiry window.
    pub fn creation_timeout(&self) -> Duration {
        Duration::from_millis(self.creation_timeout_ms)
    }
}

/// High-priority messages that capacity eviction never drops.
pub const HIGH_PRIORITY_FLOOR: usize = 10;

/// Message channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Queue cap across both priorities before eviction
    pub max_queue_size: usize,
    /// Delivery attempts before a message is dropped
    pub max_retries: u32,
    /// Delay between normal-priority sends
    pub throttle_ms: u64,
    /// Base delay before retrying a stalled queue
    pub retry_backoff_ms: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_retries: 3,
            throttle_ms: 5,
            retry_backoff_ms: 100,
        }
    }
}

impl ChannelSettings {
    /// Throttle between normal-priority sends.
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Backoff before the next pass after `retry_count` failures.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry_count.min(4));
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Split layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Smallest pane height in pixels
    pub min_pane_height: u32,
    /// Debounce window for surface and terminal resizes
    pub resize_debounce_ms: u64,
    /// Direction used when the location gives no hint
    pub default_direction: SplitDirection,
    /// Width/height ratio above which a surface counts as wide
    pub wide_aspect_ratio: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            min_pane_height: 100,
            resize_debounce_ms: 100,
            default_direction: SplitDirection::Vertical,
            wide_aspect_ratio: 1.5,
        }
    }
}

impl LayoutSettings {
    /// Resize debounce window.
    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

/// Scrollback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollbackSettings {
    /// Lines captured per snapshot
    pub max_lines: usize,
    /// Strip leading/trailing blank lines from snapshots
    pub trim_empty_lines: bool,
    /// Merge wrapped rows back into logical lines
    pub preserve_wrapped_lines: bool,
    /// Batching window for automatic saves after output
    pub save_debounce_ms: u64,
    /// Rows retained by headless views
    pub buffer_limit: usize,
}

impl Default for ScrollbackSettings {
    fn default() -> Self {
        Self {
            max_lines: 1000,
            trim_empty_lines: true,
            preserve_wrapped_lines: true,
            save_debounce_ms: 500,
            buffer_limit: 10000,
        }
    }
}

impl ScrollbackSettings {
    /// Save batching window.
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
