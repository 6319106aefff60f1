use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("I2C bus {bus_number} unavailable: {reason}")]
    Unavailable { bus_number: u8, reason: String },

    #[error("failed to write 0x{value:02x} to device 0x{address:02x}: {reason}")]
    Write {
        address: u8,
        value: u8,
        reason: String,
    },
}

/// Opens the physical bus. Kept separate from [`BusHandle`] so the handle can
/// reopen the bus after a failure.
pub trait BusDriver {
    type Bus: I2c;

    fn open(&mut self, bus_number: u8) -> Result<Self::Bus, BusError>;
}

/// Opens `/dev/i2c-N` character devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxBusDriver;

impl BusDriver for LinuxBusDriver {
    type Bus = I2cdev;

    fn open(&mut self, bus_number: u8) -> Result<I2cdev, BusError> {
        let path = format!("/dev/i2c-{bus_number}");
        I2cdev::new(&path).map_err(|e| BusError::Unavailable {
            bus_number,
            reason: format!("{path}: {e}"),
        })
    }
}

/// Owns the single bus connection and lazily reopens it after a failure.
///
/// Hardware absence is reported through `Result`, never by panicking, so a
/// flaky bus cannot take the polling loop down with it.
pub struct BusHandle<D: BusDriver> {
    driver: D,
    bus_number: u8,
    bus: Option<D::Bus>,
}

impl<D: BusDriver> BusHandle<D> {
    /// Creates a closed handle; the bus is opened on first use.
    pub fn new(driver: D, bus_number: u8) -> Self {
        Self {
            driver,
            bus_number,
            bus: None,
        }
    }

    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }

    pub fn is_available(&self) -> bool {
        self.bus.is_some()
    }

    /// Opens the bus unless it is already open.
    pub fn open(&mut self) -> Result<(), BusError> {
        if self.is_available() {
            return Ok(());
        }

        if let Err(e) = self.ensure_open() {
            warn!(error = %e, "failed to open I2C bus");
            return Err(e);
        }
        debug!(bus_number = self.bus_number, "I2C bus opened");

        Ok(())
    }

    /// Writes a single byte, reopening the bus first if a previous operation
    /// marked it unavailable. A failed write marks the bus unavailable.
    pub fn write_byte(&mut self, address: u8, value: u8) -> Result<(), BusError> {
        let bus = self.ensure_open()?;
        if let Err(e) = bus.write(address, &[value]) {
            self.bus = None;
            return Err(BusError::Write {
                address,
                value,
                reason: format!("{e:?}"),
            });
        }

        Ok(())
    }

    /// Direct access for device drivers; `None` while the bus is unavailable.
    pub fn bus_mut(&mut self) -> Option<&mut D::Bus> {
        self.bus.as_mut()
    }

    pub fn close(&mut self) {
        if self.bus.take().is_some() {
            debug!(bus_number = self.bus_number, "I2C bus closed");
        }
    }

    fn ensure_open(&mut self) -> Result<&mut D::Bus, BusError> {
        let bus = match self.bus.take() {
            Some(bus) => bus,
            None => self.driver.open(self.bus_number)?,
        };

        Ok(self.bus.insert(bus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeI2c;

    #[test]
    fn handle_is_lazy_until_first_use() {
        let fake = FakeI2c::new();
        let mut handle = BusHandle::new(fake.driver(), 1);

        assert!(!handle.is_available());
        assert_eq!(fake.open_count(), 0);

        handle.open().unwrap();
        handle.open().unwrap();
        assert!(handle.is_available());
        assert_eq!(fake.open_count(), 1);
    }

    #[test]
    fn open_reports_unavailable_bus() {
        let fake = FakeI2c::new();
        fake.set_openable(false);
        let mut handle = BusHandle::new(fake.driver(), 3);

        let err = handle.open().unwrap_err();
        assert!(matches!(err, BusError::Unavailable { bus_number: 3, .. }));
        assert!(handle.bus_mut().is_none());
    }

    #[test]
    fn failed_write_marks_unavailable_and_next_write_reopens() {
        let fake = FakeI2c::new();
        let mut handle = BusHandle::new(fake.driver(), 1);

        fake.fail_writes_to(0x70, true);
        let err = handle.write_byte(0x70, 0x01).unwrap_err();
        assert!(matches!(err, BusError::Write { address: 0x70, .. }));
        assert!(!handle.is_available());

        fake.fail_writes_to(0x70, false);
        handle.write_byte(0x70, 0x02).unwrap();
        assert!(handle.is_available());
        assert_eq!(fake.open_count(), 2);
        assert_eq!(fake.mux_writes(), vec![0x01, 0x02]);
    }
}
