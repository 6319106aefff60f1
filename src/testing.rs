//! In-memory stand-ins for the I2C bus, the PCA9548A multiplexer and BME280
//! devices, shared by the unit tests of the hardware-facing modules.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::bus::{BusDriver, BusError};
use crate::mux::MUX_ADDRESS;

pub const REFERENCE_TEMPERATURE_C: f64 = 25.08;
pub const REFERENCE_PRESSURE_HPA: f64 = 1006.53;
pub const REFERENCE_HUMIDITY_RH: f64 = 39.04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError(pub ErrorKind);

impl i2c::Error for FakeError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

struct FakeDevice {
    registers: [u8; 256],
    pointer: u8,
    fail_chip_id_reads: bool,
    fail_data_reads: bool,
}

#[derive(Default)]
struct State {
    unopenable: bool,
    opens: usize,
    selected_mask: u8,
    mux_writes: Vec<u8>,
    failing_addresses: HashSet<u8>,
    failing_masks: HashSet<u8>,
    devices: HashMap<(u8, u8), FakeDevice>,
}

/// Shared view of a simulated bus. Clones observe the same state.
#[derive(Clone, Default)]
pub struct FakeI2c {
    state: Arc<Mutex<State>>,
}

impl FakeI2c {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(&self) -> FakeDriver {
        FakeDriver { i2c: self.clone() }
    }

    pub fn bus(&self) -> FakeBus {
        FakeBus { i2c: self.clone() }
    }

    pub fn set_openable(&self, openable: bool) {
        self.state.lock().unwrap().unopenable = !openable;
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// Every byte written to the multiplexer, including rejected writes.
    pub fn mux_writes(&self) -> Vec<u8> {
        self.state.lock().unwrap().mux_writes.clone()
    }

    pub fn selected_mask(&self) -> u8 {
        self.state.lock().unwrap().selected_mask
    }

    pub fn fail_writes_to(&self, address: u8, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.failing_addresses.insert(address);
        } else {
            state.failing_addresses.remove(&address);
        }
    }

    /// Makes the multiplexer reject selection of `channel`.
    pub fn fail_channel(&self, channel: u8) {
        self.state.lock().unwrap().failing_masks.insert(1 << channel);
    }

    pub fn add_bme280(&self, channel: u8, address: u8) {
        self.add_device(channel, address, reference_registers());
    }

    pub fn add_device_with_chip_id(&self, channel: u8, address: u8, chip_id: u8) {
        let mut registers = reference_registers();
        registers[0xD0] = chip_id;
        self.add_device(channel, address, registers);
    }

    /// Calibration loads fine but every measurement read fails.
    pub fn make_flaky(&self, channel: u8, address: u8) {
        if let Some(device) = self.state.lock().unwrap().devices.get_mut(&(channel, address)) {
            device.fail_data_reads = true;
        }
    }

    /// Reads of the chip-id register fail with an unclassified error, the way
    /// some controllers report an address NACK.
    pub fn fail_chip_id_reads(&self, channel: u8, address: u8) {
        if let Some(device) = self.state.lock().unwrap().devices.get_mut(&(channel, address)) {
            device.fail_chip_id_reads = true;
        }
    }

    fn add_device(&self, channel: u8, address: u8, registers: [u8; 256]) {
        self.state.lock().unwrap().devices.insert(
            (channel, address),
            FakeDevice {
                registers,
                pointer: 0,
                fail_chip_id_reads: false,
                fail_data_reads: false,
            },
        );
    }
}

pub struct FakeDriver {
    i2c: FakeI2c,
}

impl BusDriver for FakeDriver {
    type Bus = FakeBus;

    fn open(&mut self, bus_number: u8) -> Result<FakeBus, BusError> {
        let mut state = self.i2c.state.lock().unwrap();
        if state.unopenable {
            return Err(BusError::Unavailable {
                bus_number,
                reason: "no such device".to_string(),
            });
        }
        state.opens += 1;

        Ok(self.i2c.bus())
    }
}

pub struct FakeBus {
    i2c: FakeI2c,
}

impl ErrorType for FakeBus {
    type Error = FakeError;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.i2c.state.lock().unwrap();
        let state = &mut *state;

        if address == MUX_ADDRESS {
            for op in operations.iter_mut() {
                if let Operation::Write(bytes) = op {
                    for &mask in bytes.iter() {
                        state.mux_writes.push(mask);
                        if state.failing_addresses.contains(&address)
                            || state.failing_masks.contains(&mask)
                        {
                            return Err(FakeError(ErrorKind::Other));
                        }
                        state.selected_mask = mask;
                    }
                }
            }
            return Ok(());
        }

        if state.selected_mask.count_ones() != 1 {
            return Err(FakeError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        }
        let channel = state.selected_mask.trailing_zeros() as u8;
        let Some(device) = state.devices.get_mut(&(channel, address)) else {
            return Err(FakeError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        };

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    if let Some((&register, values)) = bytes.split_first() {
                        device.pointer = register;
                        for &value in values {
                            device.registers[device.pointer as usize] = value;
                            device.pointer = device.pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buffer) => {
                    if device.fail_chip_id_reads && device.pointer == 0xD0 {
                        return Err(FakeError(ErrorKind::Other));
                    }
                    if device.fail_data_reads && device.pointer == 0xF7 {
                        return Err(FakeError(ErrorKind::Bus));
                    }
                    for byte in buffer.iter_mut() {
                        *byte = device.registers[device.pointer as usize];
                        device.pointer = device.pointer.wrapping_add(1);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub delays_ns: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delays_ns.push(ns);
    }
}

/// Register image built from the datasheet's worked example.
fn reference_registers() -> [u8; 256] {
    let mut registers = [0u8; 256];
    registers[0xD0] = 0x60;

    let words: [i32; 12] = [
        27504, 26435, -1000, 36477, -10685, 3024, 2855, 140, -7, 15500, -14600, 6000,
    ];
    for (i, word) in words.iter().enumerate() {
        let [lo, hi] = (*word as u16).to_le_bytes();
        registers[0x88 + i * 2] = lo;
        registers[0x89 + i * 2] = hi;
    }

    let (h1, h2, h3, h4, h5, h6): (u8, i16, u8, i16, i16, i8) = (75, 362, 0, 313, 50, 30);
    registers[0xA1] = h1;
    let [lo, hi] = h2.to_le_bytes();
    registers[0xE1] = lo;
    registers[0xE2] = hi;
    registers[0xE3] = h3;
    registers[0xE4] = (h4 >> 4) as u8;
    registers[0xE5] = ((h4 & 0x0F) as u8) | (((h5 & 0x0F) as u8) << 4);
    registers[0xE6] = (h5 >> 4) as u8;
    registers[0xE7] = h6 as u8;

    // adc_P = 415148, adc_T = 519888, adc_H = 0x6A00
    registers[0xF7..=0xFE].copy_from_slice(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x6A, 0x00]);

    registers
}
