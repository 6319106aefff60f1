use std::fmt;

use serde::{Serialize, Serializer};

/// 7-bit I2C address of a sensor on a multiplexer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorAddress(pub u8);

impl SensorAddress {
    /// The two addresses a BME280 can be strapped to.
    pub const BME280_ADDRESSES: [SensorAddress; 2] = [SensorAddress(0x76), SensorAddress(0x77)];
}

impl fmt::Display for SensorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

impl Serialize for SensorAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
