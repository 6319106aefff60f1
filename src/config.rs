use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("poll interval must be positive, got {0:?}")]
    NonPositiveInterval(Duration),

    #[error("history size must be at least 1")]
    EmptyHistory,
}

/// Construction-time settings for the polling engine.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Which `/dev/i2c-N` bus the multiplexer hangs off.
    pub bus_number: u8,

    pub poll_interval: Duration,

    /// Ring-buffer capacity of the snapshot history.
    pub history_size: usize,

    pub timezone: Tz,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bus_number: 1,
            poll_interval: Duration::from_secs(2),
            history_size: 10_000,
            timezone: Tz::UTC,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::NonPositiveInterval(self.poll_interval));
        }

        if self.history_size == 0 {
            return Err(ConfigError::EmptyHistory);
        }

        Ok(())
    }
}
