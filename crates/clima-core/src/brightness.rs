//! Adaptive LED brightness regulation.
//!
//! An ambient light sensor drives the duty cycle of the transistors feeding
//! the LED banks, so the indicators stay readable in sunlight without
//! blinding anyone at night.

use heapless::Vec;
use libm::exp;
use log::debug;

use crate::scheduler::{Reschedule, Task};
use crate::traits::{AnalogInput, PwmOutput};

/// Regulation tick period, ms (drift-free incremental schedule).
const REGULATION_PERIOD_MS: u64 = 50;

/// Top of the analog input range.
const ANALOG_HIGH: u16 = 1023;

/// Applied duty bounds; zero would blank the LEDs entirely.
const PWM_LOW: u8 = 0;
const PWM_HIGH: u8 = u8::MAX;

// e-exponential regression over experimentally measured operating points
// (ambient brightness -> visible duty).
const REGRESSION_A: f64 = 0.705156848;
const REGRESSION_B: f64 = 0.00396581331;

/// Smoothing window capacity; one commit evaluation per full window.
pub const SMOOTHING_WINDOW_SIZE: usize = 10;

/// Maximum number of PWM outputs one regulator can drive.
pub const MAX_OUTPUTS: usize = 4;

const LOG_THROTTLE_MS: u64 = 5_000;

/// Fixed-capacity window of recent duty targets.
///
/// Drained after every commit evaluation: "full" is a recurring trigger,
/// not a steady state.
#[derive(Default)]
pub struct SmoothingWindow<const N: usize> {
    samples: Vec<u8, N>,
}

impl<const N: usize> SmoothingWindow<N> {
    pub const fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Pushing into a full window is a programming error; the owner drains
    /// it on every commit evaluation.
    pub fn push(&mut self, sample: u8) {
        debug_assert!(!self.is_full());
        let _ = self.samples.push(sample);
    }

    pub fn is_full(&self) -> bool {
        self.samples.is_full()
    }

    pub fn max(&self) -> Option<u8> {
        self.samples.iter().copied().max()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Duty target for an ambient light reading.
pub fn duty_for_ambient(reading: u16) -> u8 {
    let brightness = ANALOG_HIGH.saturating_sub(reading);
    let target = REGRESSION_A * exp(REGRESSION_B * f64::from(brightness));
    target.clamp(f64::from(PWM_LOW + 1), f64::from(PWM_HIGH)) as u8
}

/// Dims the LED banks to ambient light through their PWM supply outputs.
pub struct BrightnessRegulator<A: AnalogInput, P: PwmOutput> {
    light_sensor: A,
    outputs: Vec<P, MAX_OUTPUTS>,
    window: SmoothingWindow<SMOOTHING_WINDOW_SIZE>,
    pwm_value: u8,
    last_log_ms: u64,
}

impl<A: AnalogInput, P: PwmOutput> BrightnessRegulator<A, P> {
    /// Takes the sensor and the outputs; applies the dimmest duty
    /// immediately so boot in a dark room does not flash.
    pub fn new(light_sensor: A, mut outputs: Vec<P, MAX_OUTPUTS>) -> Self {
        let pwm_value = PWM_LOW + 1;
        for output in outputs.iter_mut() {
            output.set_duty(pwm_value);
        }

        Self {
            light_sensor,
            outputs,
            window: SmoothingWindow::new(),
            pwm_value,
            last_log_ms: 0,
        }
    }

    /// The duty currently applied to the outputs.
    pub fn applied_duty(&self) -> u8 {
        self.pwm_value
    }
}

impl<A: AnalogInput, P: PwmOutput> Task for BrightnessRegulator<A, P> {
    fn execute(&mut self, now_ms: u64) -> Reschedule {
        let reading = self.light_sensor.read();

        if now_ms - self.last_log_ms >= LOG_THROTTLE_MS {
            debug!("Brightness: {}.", ANALOG_HIGH.saturating_sub(reading));
            self.last_log_ms = now_ms;
        }

        self.window.push(duty_for_ambient(reading));

        if self.window.is_full() {
            let committed = self.window.max().unwrap_or(self.pwm_value);
            self.window.clear();

            if committed != self.pwm_value {
                self.pwm_value = committed;
                for output in self.outputs.iter_mut() {
                    output.set_duty(committed);
                }
            }
        }

        Reschedule::Increment(REGULATION_PERIOD_MS)
    }
}
