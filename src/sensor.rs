mod address;
pub mod bme280;
mod probe;
mod sample;

pub use address::*;
pub use probe::*;
pub use sample::*;
