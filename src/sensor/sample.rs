use serde::Serialize;

const PRECISION: f64 = 100.0;

/// One environmental reading, rounded to two decimals at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSample {
    pub temperature_c: f64,

    pub pressure_hpa: f64,

    pub humidity_rh: f64,
}

impl SensorSample {
    pub fn new(temperature_c: f64, pressure_hpa: f64, humidity_rh: f64) -> Self {
        Self {
            temperature_c: round(temperature_c),
            pressure_hpa: round(pressure_hpa),
            humidity_rh: round(humidity_rh),
        }
    }
}

fn round(v: f64) -> f64 {
    (v * PRECISION).round() / PRECISION
}
