use std::{net::SocketAddr, time::Duration};

use anyhow::{Context as _, Result};
use chrono_tz::Tz;
use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    /// I2C bus the multiplexer is attached to (`/dev/i2c-N`).
    #[arg(long, env = "I2C_BUS", default_value_t = 1)]
    pub bus_number: u8,

    /// Seconds between the starts of consecutive sweeps.
    #[arg(long, env = "POLL_INTERVAL", default_value_t = 2.0)]
    pub poll_interval: f64,

    /// Number of sweeps kept in memory.
    #[arg(long, env = "HISTORY_SIZE", default_value_t = 10_000)]
    pub history_size: usize,

    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    #[arg(long, env = "TZ", default_value = "UTC")]
    pub timezone: Tz,
}

impl Args {
    /// Rejects negative, non-finite and out-of-range intervals. Zero passes
    /// here and is refused by `MonitorConfig::validate`.
    pub fn poll_period(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.poll_interval)
            .with_context(|| format!("invalid poll interval: {}", self.poll_interval))
    }
}
