use embedded_hal::delay::DelayNs;
use tracing::{debug, trace};

use crate::bus::{BusDriver, BusHandle};
use crate::sensor::bme280::{self, Bme280Error};
use crate::sensor::{SensorAddress, SensorSample};

/// Result of probing one address on the currently selected channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Sample(SensorSample),

    /// Nothing answered, or something other than a BME280 did.
    Absent,

    /// The device was there but the read failed.
    Transient(String),
}

impl ProbeOutcome {
    pub fn sample(self) -> Option<SensorSample> {
        match self {
            ProbeOutcome::Sample(sample) => Some(sample),
            ProbeOutcome::Absent | ProbeOutcome::Transient(_) => None,
        }
    }
}

/// Reads one BME280. Never fails: absence and I/O errors come back as
/// [`ProbeOutcome`] variants so one bad address cannot abort a sweep.
pub fn probe<D: BusDriver>(
    bus: &mut BusHandle<D>,
    delay: &mut impl DelayNs,
    address: SensorAddress,
) -> ProbeOutcome {
    let Some(i2c) = bus.bus_mut() else {
        return ProbeOutcome::Transient("I2C bus unavailable".to_string());
    };

    let calibration = match bme280::load_calibration(i2c, address.0) {
        Ok(c) => c,
        Err(Bme280Error::NotDetected(e)) => {
            trace!(%address, error = ?e, "no device");
            return ProbeOutcome::Absent;
        }
        Err(Bme280Error::UnexpectedChipId(id)) => {
            trace!(%address, chip_id = id, "not a BME280");
            return ProbeOutcome::Absent;
        }
        Err(e) => {
            debug!(%address, error = %e, "failed to load calibration");
            return ProbeOutcome::Transient(e.to_string());
        }
    };

    match bme280::sample(i2c, delay, address.0, &calibration) {
        Ok(m) => ProbeOutcome::Sample(SensorSample::new(
            m.temperature_c,
            m.pressure_hpa,
            m.humidity_rh,
        )),
        Err(e) => {
            debug!(%address, error = %e, "failed to sample");
            ProbeOutcome::Transient(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::Multiplexer;
    use crate::testing::{
        FakeI2c, RecordingDelay, REFERENCE_HUMIDITY_RH, REFERENCE_PRESSURE_HPA,
        REFERENCE_TEMPERATURE_C,
    };

    fn probe_on(fake: &FakeI2c, channel: u8, address: u8) -> ProbeOutcome {
        let mut bus = BusHandle::new(fake.driver(), 1);
        let mut delay = RecordingDelay::default();
        assert!(Multiplexer::default().select_channel(&mut bus, &mut delay, channel));

        probe(&mut bus, &mut delay, SensorAddress(address))
    }

    #[test]
    fn present_sensor_yields_rounded_sample() {
        let fake = FakeI2c::new();
        fake.add_bme280(4, 0x77);

        assert_eq!(
            probe_on(&fake, 4, 0x77),
            ProbeOutcome::Sample(SensorSample {
                temperature_c: REFERENCE_TEMPERATURE_C,
                pressure_hpa: REFERENCE_PRESSURE_HPA,
                humidity_rh: REFERENCE_HUMIDITY_RH,
            })
        );
    }

    #[test]
    fn missing_or_foreign_devices_are_absent() {
        let fake = FakeI2c::new();
        fake.add_bme280(0, 0x76);
        fake.add_device_with_chip_id(0, 0x77, 0x58);

        assert_eq!(probe_on(&fake, 1, 0x76), ProbeOutcome::Absent);
        assert_eq!(probe_on(&fake, 0, 0x77), ProbeOutcome::Absent);
    }

    #[test]
    fn unclassified_error_on_presence_check_is_absent() {
        let fake = FakeI2c::new();
        fake.add_bme280(3, 0x76);
        fake.fail_chip_id_reads(3, 0x76);

        assert_eq!(probe_on(&fake, 3, 0x76), ProbeOutcome::Absent);
    }

    #[test]
    fn read_failure_after_calibration_is_transient() {
        let fake = FakeI2c::new();
        fake.add_bme280(6, 0x76);
        fake.make_flaky(6, 0x76);

        let outcome = probe_on(&fake, 6, 0x76);
        assert!(matches!(outcome, ProbeOutcome::Transient(_)));
        assert_eq!(outcome.sample(), None);
    }

    #[test]
    fn closed_bus_is_transient() {
        let fake = FakeI2c::new();
        let mut bus = BusHandle::new(fake.driver(), 1);
        let mut delay = RecordingDelay::default();

        let outcome = probe(&mut bus, &mut delay, SensorAddress(0x76));
        assert!(matches!(outcome, ProbeOutcome::Transient(_)));
        assert_eq!(fake.open_count(), 0);
    }
}
