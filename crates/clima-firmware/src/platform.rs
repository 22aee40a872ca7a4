//! Adapters from `esp-hal` peripherals to the core platform seams.

use clima_core::traits::{AnalogInput, PwmOutput, ReportSink, TimeSource};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcChannel, AdcPin};
use esp_hal::ledc::channel::{Channel, ChannelHW};
use esp_hal::ledc::LowSpeed;
use esp_hal::peripherals::ADC1;

/// System timer as the monotonic time source.
#[derive(Clone, Copy, Default)]
pub struct EspClock;

impl TimeSource for EspClock {
    fn now_ms(&self) -> u64 {
        esp_hal::time::Instant::now().duration_since_epoch().as_millis()
    }

    fn now_us(&self) -> u64 {
        esp_hal::time::Instant::now().duration_since_epoch().as_micros()
    }
}

/// Ambient light input on an ADC1 channel, scaled down to the core's
/// 10-bit range.
pub struct LightSensor<'d, PIN: AdcChannel> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    pin: AdcPin<PIN, ADC1<'d>>,
}

impl<'d, PIN: AdcChannel> LightSensor<'d, PIN> {
    pub fn new(adc: Adc<'d, ADC1<'d>, Blocking>, pin: AdcPin<PIN, ADC1<'d>>) -> Self {
        Self { adc, pin }
    }
}

impl<PIN: AdcChannel> AnalogInput for LightSensor<'_, PIN> {
    fn read(&mut self) -> u16 {
        loop {
            match self.adc.read_oneshot(&mut self.pin) {
                Ok(raw) => return raw >> 2,
                // Conversion still in flight.
                Err(_) => continue,
            }
        }
    }
}

/// LED supply transistor driven by a LEDC channel.
pub struct LedSupplyPwm<'d> {
    channel: Channel<'d, LowSpeed>,
}

impl<'d> LedSupplyPwm<'d> {
    pub fn new(channel: Channel<'d, LowSpeed>) -> Self {
        Self { channel }
    }
}

impl PwmOutput for LedSupplyPwm<'_> {
    fn set_duty(&mut self, duty: u8) {
        // The channel was configured with 8-bit resolution; write the duty
        // counter directly.
        self.channel.set_duty_hw(u32::from(duty));
    }
}

/// Forwards accepted-frame lines to the host over RTT.
#[derive(Default)]
pub struct RttSink;

impl ReportSink for RttSink {
    fn forward(&mut self, line: &str) {
        rtt_target::rprintln!("{}", line);
    }
}
