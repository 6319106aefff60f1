use std::{collections::BTreeMap, time::Instant};

use chrono::Utc;
use chrono_tz::Tz;
use embedded_hal::delay::DelayNs;
use linux_embedded_hal::Delay;
use tracing::{debug, trace};

use crate::bus::{BusDriver, BusHandle, LinuxBusDriver};
use crate::config::MonitorConfig;
use crate::mux::{Channel, Multiplexer};
use crate::sensor::{ProbeOutcome, SensorAddress, probe};
use crate::snapshot::{ChannelReadings, Snapshot};

/// Something that produces one [`Snapshot`] per call. The scheduler drives it
/// from a single thread at a time.
pub trait Sweeper {
    fn sweep(&mut self) -> Snapshot;
}

/// Scans every multiplexer channel for every known sensor address.
pub struct SweepExecutor<D: BusDriver, T: DelayNs> {
    bus: BusHandle<D>,
    mux: Multiplexer,
    delay: T,
    addresses: Vec<SensorAddress>,
    timezone: Tz,
}

impl SweepExecutor<LinuxBusDriver, Delay> {
    pub fn linux(config: &MonitorConfig) -> Self {
        Self::new(
            BusHandle::new(LinuxBusDriver, config.bus_number),
            Delay,
            config.timezone,
        )
    }
}

impl<D: BusDriver, T: DelayNs> SweepExecutor<D, T> {
    /// Uses the default multiplexer address and both BME280 addresses.
    pub fn new(bus: BusHandle<D>, delay: T, timezone: Tz) -> Self {
        Self {
            bus,
            mux: Multiplexer::default(),
            delay,
            addresses: SensorAddress::BME280_ADDRESSES.to_vec(),
            timezone,
        }
    }

    pub fn with_addresses(mut self, addresses: Vec<SensorAddress>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn run(&mut self) -> Snapshot {
        let started = Instant::now();

        if let Err(e) = self.bus.open() {
            return Snapshot::bus_unavailable(self.now(), e.to_string());
        }

        let mut channels = BTreeMap::new();
        for channel in Channel::all() {
            if !self.mux.select(&mut self.bus, &mut self.delay, channel) {
                continue;
            }

            let mut readings = ChannelReadings::new();
            for &address in &self.addresses {
                match probe(&mut self.bus, &mut self.delay, address) {
                    ProbeOutcome::Sample(sample) => {
                        readings.insert(address, sample);
                    }
                    ProbeOutcome::Absent => {}
                    ProbeOutcome::Transient(reason) => {
                        trace!(%channel, %address, %reason, "skipping sensor");
                    }
                }
            }

            if !readings.is_empty() {
                channels.insert(channel, readings);
            }
        }
        self.mux.disable_all(&mut self.bus);

        let duration = started.elapsed();
        debug!(
            channels = channels.len(),
            sensors = channels.values().map(|r| r.len()).sum::<usize>(),
            duration_ms = duration.as_millis() as u64,
            "sweep finished"
        );

        Snapshot::completed(self.now(), duration, channels)
    }

    /// Disconnects every channel and closes the bus.
    pub fn release(&mut self) {
        self.mux.disable_all(&mut self.bus);
        self.bus.close();
    }

    fn now(&self) -> chrono::DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }
}

impl<D: BusDriver, T: DelayNs> Sweeper for SweepExecutor<D, T> {
    fn sweep(&mut self) -> Snapshot {
        self.run()
    }
}
