//! Periodic transmission of the latest readings.

use core::cell::RefCell;

use log::{debug, warn};

use crate::message::SensorMessage;
use crate::scheduler::{Reschedule, Task};
use crate::traits::RadioTransport;

/// Transmission period, ms (drift-free incremental schedule).
const TRANSMIT_PERIOD_MS: u64 = 30_000;

/// Retry delay while no reading has succeeded yet, ms.
const NO_DATA_RETRY_MS: u64 = 2_000;

/// Last-good climate readings of a co-resident acquisition task.
pub trait ClimateSource {
    /// `None` until the first successful read.
    fn temperature(&self) -> Option<i8>;

    /// `None` until the first successful read.
    fn humidity(&self) -> Option<u8>;
}

/// Encodes and radios out the node's readings.
pub struct Transmitter<'a, R: RadioTransport> {
    source: &'a RefCell<dyn ClimateSource + 'a>,
    radio: R,
    sensor_id: u8,
    co2_concentration: u16,
    pressure: u16,
    sent: u32,
    send_errors: u32,
}

impl<'a, R: RadioTransport> Transmitter<'a, R> {
    pub fn new(sensor_id: u8, source: &'a RefCell<dyn ClimateSource + 'a>, radio: R) -> Self {
        Self {
            source,
            radio,
            sensor_id,
            co2_concentration: 0,
            pressure: 0,
            sent: 0,
            send_errors: 0,
        }
    }

    /// Latest reading of a co-resident CO2 sensor, ppm. Zero until recorded.
    pub fn record_co2(&mut self, ppm: u16) {
        self.co2_concentration = ppm.min(0xFFF);
    }

    /// Latest reading of a co-resident pressure sensor. Zero until recorded.
    pub fn record_pressure(&mut self, pressure: u16) {
        self.pressure = pressure.min(0x3FF);
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn send_errors(&self) -> u32 {
        self.send_errors
    }
}

impl<R: RadioTransport> Task for Transmitter<'_, R> {
    fn execute(&mut self, _now_ms: u64) -> Reschedule {
        let (temperature, humidity) = {
            let source = self.source.borrow();
            (source.temperature(), source.humidity())
        };
        let (Some(temperature), Some(humidity)) = (temperature, humidity) else {
            return Reschedule::After(NO_DATA_RETRY_MS);
        };

        // The wire fields are narrower than the sensor ranges.
        let message = SensorMessage::new(
            self.sensor_id,
            temperature.clamp(-32, 31),
            humidity.min(100),
            self.co2_concentration,
            self.pressure,
        );

        match self.radio.send(&message.encode()) {
            Ok(()) => {
                self.sent += 1;
                debug!("Sent message #{} from sensor #{}.", self.sent, self.sensor_id);
            }
            Err(error) => {
                self.send_errors += 1;
                warn!("Failed to send the sensor message: {}.", error);
            }
        }

        Reschedule::Increment(TRANSMIT_PERIOD_MS)
    }
}
