//! Minimal BME280 driver: presence check, calibration load and a single
//! forced-mode measurement using the datasheet's floating-point compensation.
//!
//! Ref: Bosch BME280 datasheet, rev 1.6, sections 4.2.2, 5.4 and 8.1.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use thiserror::Error;

pub const CHIP_ID: u8 = 0x60;

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_00: u8 = 0x88;
const REG_CALIB_26: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;

const CALIB_00_LEN: usize = 26;
const CALIB_26_LEN: usize = 7;
const DATA_LEN: usize = 8;

const OVERSAMPLING_X1: u8 = 0b001;
const MODE_FORCED: u8 = 0b01;

// 1.25 + 2.3 * osrs_t + (2.3 * osrs_p + 0.575) + (2.3 * osrs_h + 0.575) ms
const MEASUREMENT_TIME_US: u32 = 9_300;

#[derive(Debug, Error)]
pub enum Bme280Error<E: core::fmt::Debug> {
    /// The chip-id read failed, whatever the bus reported.
    #[error("no device answered: {0:?}")]
    NotDetected(E),

    #[error("I2C error: {0:?}")]
    Bus(E),

    #[error("unexpected chip id 0x{0:02x}, expected 0x60")]
    UnexpectedChipId(u8),
}

/// Factory trimming parameters burned into each device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p2: i16,
    p3: i16,
    p4: i16,
    p5: i16,
    p6: i16,
    p7: i16,
    p8: i16,
    p9: i16,
    h1: u8,
    h2: i16,
    h3: u8,
    h4: i16,
    h5: i16,
    h6: i8,
}

impl Calibration {
    fn from_registers(calib00: &[u8; CALIB_00_LEN], calib26: &[u8; CALIB_26_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([calib00[i], calib00[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([calib00[i], calib00[i + 1]]);

        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p1: u16_at(6),
            p2: i16_at(8),
            p3: i16_at(10),
            p4: i16_at(12),
            p5: i16_at(14),
            p6: i16_at(16),
            p7: i16_at(18),
            p8: i16_at(20),
            p9: i16_at(22),
            h1: calib00[25],
            h2: i16::from_le_bytes([calib26[0], calib26[1]]),
            h3: calib26[2],
            h4: (i16::from(calib26[3] as i8) << 4) | i16::from(calib26[4] & 0x0F),
            h5: (i16::from(calib26[5] as i8) << 4) | i16::from(calib26[4] >> 4),
            h6: calib26[6] as i8,
        }
    }

    /// Converts raw ADC values into physical units.
    pub fn compensate(&self, raw: RawMeasurement) -> Measurement {
        let t_fine = self.t_fine(raw.temperature);

        Measurement {
            temperature_c: t_fine / 5120.0,
            pressure_hpa: self.pressure_pa(raw.pressure, t_fine) / 100.0,
            humidity_rh: self.humidity(raw.humidity, t_fine),
        }
    }

    fn t_fine(&self, adc_t: u32) -> f64 {
        let adc_t = f64::from(adc_t);
        let t1 = f64::from(self.t1);

        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * f64::from(self.t2);
        let var2 = (adc_t / 131072.0 - t1 / 8192.0).powi(2) * f64::from(self.t3);
        var1 + var2
    }

    fn pressure_pa(&self, adc_p: u32, t_fine: f64) -> f64 {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * f64::from(self.p6) / 32768.0;
        var2 += var1 * f64::from(self.p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(self.p4) * 65536.0;
        var1 = (f64::from(self.p3) * var1 * var1 / 524288.0 + f64::from(self.p2) * var1)
            / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * f64::from(self.p1);
        if var1 == 0.0 {
            return 0.0;
        }

        let mut p = 1048576.0 - f64::from(adc_p);
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        var1 = f64::from(self.p9) * p * p / 2147483648.0;
        var2 = p * f64::from(self.p8) / 32768.0;
        p + (var1 + var2 + f64::from(self.p7)) / 16.0
    }

    fn humidity(&self, adc_h: u16, t_fine: f64) -> f64 {
        let mut h = t_fine - 76800.0;
        h = (f64::from(adc_h) - (f64::from(self.h4) * 64.0 + f64::from(self.h5) / 16384.0 * h))
            * (f64::from(self.h2) / 65536.0
                * (1.0
                    + f64::from(self.h6) / 67108864.0
                        * h
                        * (1.0 + f64::from(self.h3) / 67108864.0 * h)));
        h *= 1.0 - f64::from(self.h1) * h / 524288.0;
        h.clamp(0.0, 100.0)
    }
}

/// Uncompensated ADC output of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMeasurement {
    pub pressure: u32,
    pub temperature: u32,
    pub humidity: u16,
}

impl RawMeasurement {
    fn from_registers(data: &[u8; DATA_LEN]) -> Self {
        let adc20 = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };

        Self {
            pressure: adc20(data[0], data[1], data[2]),
            temperature: adc20(data[3], data[4], data[5]),
            humidity: u16::from_be_bytes([data[6], data[7]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub humidity_rh: f64,
}

/// Confirms a BME280 answers at `address` and reads its calibration.
pub fn load_calibration<I: I2c>(
    i2c: &mut I,
    address: u8,
) -> Result<Calibration, Bme280Error<I::Error>> {
    let mut chip_id = [0u8; 1];
    // Controllers disagree on how an address NACK is reported (ENXIO, EREMOTEIO, ...).
    i2c.write_read(address, &[REG_CHIP_ID], &mut chip_id)
        .map_err(Bme280Error::NotDetected)?;
    if chip_id[0] != CHIP_ID {
        return Err(Bme280Error::UnexpectedChipId(chip_id[0]));
    }

    let mut calib00 = [0u8; CALIB_00_LEN];
    i2c.write_read(address, &[REG_CALIB_00], &mut calib00)
        .map_err(Bme280Error::Bus)?;
    let mut calib26 = [0u8; CALIB_26_LEN];
    i2c.write_read(address, &[REG_CALIB_26], &mut calib26)
        .map_err(Bme280Error::Bus)?;

    Ok(Calibration::from_registers(&calib00, &calib26))
}

/// Triggers one forced-mode conversion and returns the compensated result.
pub fn sample<I: I2c>(
    i2c: &mut I,
    delay: &mut impl DelayNs,
    address: u8,
    calibration: &Calibration,
) -> Result<Measurement, Bme280Error<I::Error>> {
    // ctrl_hum only takes effect after a subsequent write to ctrl_meas.
    i2c.write(address, &[REG_CTRL_HUM, OVERSAMPLING_X1])
        .map_err(Bme280Error::Bus)?;
    let ctrl_meas = (OVERSAMPLING_X1 << 5) | (OVERSAMPLING_X1 << 2) | MODE_FORCED;
    i2c.write(address, &[REG_CTRL_MEAS, ctrl_meas])
        .map_err(Bme280Error::Bus)?;

    delay.delay_us(MEASUREMENT_TIME_US);

    let mut data = [0u8; DATA_LEN];
    i2c.write_read(address, &[REG_DATA], &mut data)
        .map_err(Bme280Error::Bus)?;

    Ok(calibration.compensate(RawMeasurement::from_registers(&data)))
}
