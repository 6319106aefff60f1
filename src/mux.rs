use std::{fmt, time::Duration};

use embedded_hal::delay::DelayNs;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::bus::{BusDriver, BusHandle};

/// Default control address of the PCA9548A.
pub const MUX_ADDRESS: u8 = 0x70;

pub const CHANNEL_COUNT: u8 = 8;

/// Time the analog switch needs before a selected channel is safe to read.
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);

/// A multiplexer channel, guaranteed to be in `0..CHANNEL_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub fn new(index: u8) -> Option<Self> {
        (index < CHANNEL_COUNT).then_some(Self(index))
    }

    pub fn all() -> impl Iterator<Item = Channel> {
        (0..CHANNEL_COUNT).map(Channel)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    fn mask(self) -> u8 {
        1 << self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel_{}", self.0)
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Multiplexer {
    address: u8,
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new(MUX_ADDRESS)
    }
}

impl Multiplexer {
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    /// Routes the bus to `channel`. Out-of-range channels are rejected without
    /// touching the bus; a failed write is reported as `false`.
    pub fn select_channel<D: BusDriver>(
        &self,
        bus: &mut BusHandle<D>,
        delay: &mut impl DelayNs,
        channel: u8,
    ) -> bool {
        match Channel::new(channel) {
            Some(channel) => self.select(bus, delay, channel),
            None => false,
        }
    }

    pub fn select<D: BusDriver>(
        &self,
        bus: &mut BusHandle<D>,
        delay: &mut impl DelayNs,
        channel: Channel,
    ) -> bool {
        if let Err(e) = bus.write_byte(self.address, channel.mask()) {
            debug!(%channel, error = %e, "failed to select multiplexer channel");
            return false;
        }

        delay.delay_ms(SETTLE_DELAY.as_millis() as u32);
        true
    }

    /// Disconnects every channel. Best effort: failures are ignored.
    pub fn disable_all<D: BusDriver>(&self, bus: &mut BusHandle<D>) {
        if !bus.is_available() {
            return;
        }

        if let Err(e) = bus.write_byte(self.address, 0x00) {
            debug!(error = %e, "failed to disable multiplexer channels");
        }
    }
}
