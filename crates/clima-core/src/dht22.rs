//! DHT22 acquisition state machine.
//!
//! The sensor speaks a timed single-wire protocol: an 18 ms start pulse
//! from the controller, a shaped acknowledge pulse pair from the device,
//! then 40 bits encoded in the duration of the line's high phase. Reads are
//! synchronous and bounded by per-edge timeouts; they block the whole
//! system for at most a few milliseconds, which is what the timing demands.
//! The protocol mandates at least two seconds between reads.

use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;
use thiserror_no_std::Error;

use crate::buzzer::AlertSignal;
use crate::comfort::{HumidityComfort, TemperatureComfort};
use crate::indication::{LedGroup, LedProgressTask, LedRegister};
use crate::scheduler::{Reschedule, Task};
use crate::traits::{TimeSource, infallible};
use crate::transmitter::ClimateSource;

/// Start signal hold, ms.
const START_SIGNAL_MS: u64 = 18;

/// Mandatory minimum delay between read cycles, ms.
const READ_PERIOD_MS: u64 = 2_000;

/// Per-edge timeout while waiting for the device, µs.
const EDGE_TIMEOUT_US: u64 = 200;

/// High phases longer than this decode as a one, µs.
const BIT_ONE_THRESHOLD_US: u64 = 50;

/// Poll granularity of the bounded busy-waits, µs.
const POLL_STEP_US: u32 = 1;

const DATA_BITS: usize = 40;
const DATA_BYTES: usize = DATA_BITS / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Dht22Error {
    /// The device missed an expected edge within its timeout.
    #[error("timeout waiting for the sensor")]
    Timeout,
    /// Received data contradicts its checksum.
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between read cycles; the next execution begins the start signal.
    Idle,
    /// The start signal is being held low; the next execution reads.
    StartReading,
    /// Mid-read. Never observed by the scheduler: reads run to completion.
    Reading,
}

/// Periodic acquisition task: drives the sensor bus, classifies readings,
/// updates the indicator groups and raises the buzzer.
pub struct Dht22<'a, R, P, D, T>
where
    R: LedRegister,
    P: InputPin<Error = Infallible> + OutputPin<Error = Infallible>,
    D: DelayNs,
    T: TimeSource,
{
    pin: P,
    delay: D,
    time: T,
    state: State,
    paused: bool,

    temperature: Option<i8>,
    temperature_comfort: Option<TemperatureComfort>,
    temperature_leds: LedGroup<'a, R>,
    temperature_progress: &'a RefCell<LedProgressTask<'a, R>>,

    humidity: Option<u8>,
    humidity_comfort: Option<HumidityComfort>,
    humidity_leds: LedGroup<'a, R>,
    humidity_progress: &'a RefCell<LedProgressTask<'a, R>>,

    buzzer: &'a RefCell<dyn AlertSignal + 'a>,
    read_errors: u32,
}

impl<'a, R, P, D, T> Dht22<'a, R, P, D, T>
where
    R: LedRegister,
    P: InputPin<Error = Infallible> + OutputPin<Error = Infallible>,
    D: DelayNs,
    T: TimeSource,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut pin: P,
        delay: D,
        time: T,
        temperature_leds: LedGroup<'a, R>,
        temperature_progress: &'a RefCell<LedProgressTask<'a, R>>,
        humidity_leds: LedGroup<'a, R>,
        humidity_progress: &'a RefCell<LedProgressTask<'a, R>>,
        buzzer: &'a RefCell<dyn AlertSignal + 'a>,
    ) -> Self {
        // Released line idles high through the pull-up.
        infallible(pin.set_high());

        Self {
            pin,
            delay,
            time,
            state: State::Idle,
            paused: false,
            temperature: None,
            temperature_comfort: None,
            temperature_leds,
            temperature_progress,
            humidity: None,
            humidity_comfort: None,
            humidity_leds,
            humidity_progress,
            buzzer,
            read_errors: 0,
        }
    }

    /// Last successfully decoded temperature, °C.
    pub fn temperature(&self) -> Option<i8> {
        self.temperature
    }

    /// Last successfully decoded relative humidity, %.
    pub fn humidity(&self) -> Option<u8> {
        self.humidity
    }

    pub fn read_errors(&self) -> u32 {
        self.read_errors
    }

    fn wait_for_level(&mut self, level: bool, timeout_us: u64) -> Result<(), Dht22Error> {
        let started_us = self.time.now_us();
        loop {
            if infallible(self.pin.is_high()) == level {
                return Ok(());
            }
            if self.time.elapsed_us_since(started_us) >= timeout_us {
                return Err(Dht22Error::Timeout);
            }
            self.delay.delay_us(POLL_STEP_US);
        }
    }

    fn receive_bit(&mut self) -> Result<bool, Dht22Error> {
        // Low preamble, then a high phase whose duration carries the bit.
        self.wait_for_level(false, EDGE_TIMEOUT_US)?;
        self.wait_for_level(true, EDGE_TIMEOUT_US)?;
        let high_started_us = self.time.now_us();
        self.wait_for_level(false, EDGE_TIMEOUT_US)?;
        Ok(self.time.elapsed_us_since(high_started_us) > BIT_ONE_THRESHOLD_US)
    }

    fn read_frame(&mut self) -> Result<(u16, u16), Dht22Error> {
        // Release the line; the device acknowledges with a pulse pair.
        infallible(self.pin.set_high());
        self.wait_for_level(false, EDGE_TIMEOUT_US)?;
        self.wait_for_level(true, EDGE_TIMEOUT_US)?;

        self.state = State::Reading;
        let mut bytes = [0u8; DATA_BYTES];
        for bit_id in 0..DATA_BITS {
            if self.receive_bit()? {
                bytes[bit_id / 8] |= 1 << (7 - bit_id % 8);
            }
        }

        let sum = bytes[0]
            .wrapping_add(bytes[1])
            .wrapping_add(bytes[2])
            .wrapping_add(bytes[3]);
        if sum != bytes[4] {
            return Err(Dht22Error::ChecksumMismatch);
        }

        Ok((
            u16::from_be_bytes([bytes[0], bytes[1]]),
            u16::from_be_bytes([bytes[2], bytes[3]]),
        ))
    }

    fn on_reading(&mut self, humidity_raw: u16, temperature_raw: u16, now_ms: u64) {
        // Both quantities arrive in tenths; the temperature's top bit is
        // the sign.
        let humidity = (humidity_raw / 10).min(100) as u8;
        let magnitude = ((temperature_raw & 0x7FFF) / 10) as i16;
        let temperature = if temperature_raw & 0x8000 != 0 {
            -magnitude
        } else {
            magnitude
        } as i8;

        self.temperature = Some(temperature);
        self.humidity = Some(humidity);

        let temperature_comfort = TemperatureComfort::classify(temperature);
        if self.temperature_comfort != Some(temperature_comfort) {
            self.temperature_comfort = Some(temperature_comfort);
            self.temperature_progress.borrow_mut().pause();
            self.temperature_leds
                .set_led(temperature_comfort.led_position());
            if !temperature_comfort.is_comfortable() {
                self.buzzer.borrow_mut().alert(now_ms);
            }
        }

        let humidity_comfort = HumidityComfort::classify(humidity);
        if self.humidity_comfort != Some(humidity_comfort) {
            self.humidity_comfort = Some(humidity_comfort);
            self.humidity_progress.borrow_mut().pause();
            self.humidity_leds.set_led(humidity_comfort.led_position());
            if !humidity_comfort.is_comfortable() {
                self.buzzer.borrow_mut().alert(now_ms);
            }
        }
    }

    fn on_error(&mut self, error: Dht22Error) {
        self.read_errors += 1;
        warn!("DHT22 read failed: {}.", error);

        // Keep the "working" cue alive for a quantity with no reading yet.
        if self.temperature_comfort.is_none() {
            self.temperature_progress.borrow_mut().resume();
        }
        if self.humidity_comfort.is_none() {
            self.humidity_progress.borrow_mut().resume();
        }
    }
}

impl<R, P, D, T> Task for Dht22<'_, R, P, D, T>
where
    R: LedRegister,
    P: InputPin<Error = Infallible> + OutputPin<Error = Infallible>,
    D: DelayNs,
    T: TimeSource,
{
    fn execute(&mut self, now_ms: u64) -> Reschedule {
        match self.state {
            State::Idle => {
                infallible(self.pin.set_low());
                self.state = State::StartReading;
                Reschedule::After(START_SIGNAL_MS)
            }
            State::StartReading | State::Reading => {
                let result = self.read_frame();
                self.state = State::Idle;
                match result {
                    Ok((humidity_raw, temperature_raw)) => {
                        self.on_reading(humidity_raw, temperature_raw, now_ms);
                    }
                    Err(error) => self.on_error(error),
                }
                Reschedule::After(READ_PERIOD_MS)
            }
        }
    }

    /// Halts the progress animations too; an in-flight bit read is never
    /// interrupted because reads run to completion within one execution.
    fn pause(&mut self) {
        self.paused = true;
        self.temperature_progress.borrow_mut().pause();
        self.humidity_progress.borrow_mut().pause();
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

impl<R, P, D, T> ClimateSource for Dht22<'_, R, P, D, T>
where
    R: LedRegister,
    P: InputPin<Error = Infallible> + OutputPin<Error = Infallible>,
    D: DelayNs,
    T: TimeSource,
{
    fn temperature(&self) -> Option<i8> {
        self.temperature
    }

    fn humidity(&self) -> Option<u8> {
        self.humidity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{LineScript, MockAlert, MockClock, MockDelay, MockLedRegister, SimPin};

    /// Device-side protocol timings for the scripted line.
    const ACK_DELAY_US: u64 = 30;
    const ACK_PHASE_US: u64 = 80;
    const BIT_LOW_US: u64 = 50;
    const BIT_ZERO_HIGH_US: u64 = 26;
    const BIT_ONE_HIGH_US: u64 = 70;

    /// A full device response starting when the controller releases the
    /// line at `start_us`.
    fn frame_script(start_us: u64, bytes: [u8; DATA_BYTES]) -> LineScript {
        let mut script = LineScript::new(true);
        let mut at = start_us + ACK_DELAY_US;

        script.set(at, false);
        at += ACK_PHASE_US;
        script.set(at, true);
        at += ACK_PHASE_US;

        for byte in bytes {
            for bit in (0..8).rev() {
                script.set(at, false);
                at += BIT_LOW_US;
                script.set(at, true);
                at += if byte & (1 << bit) != 0 {
                    BIT_ONE_HIGH_US
                } else {
                    BIT_ZERO_HIGH_US
                };
            }
        }

        // Transmission tail: the device pulls low once more, then releases.
        script.set(at, false);
        script.set(at + BIT_LOW_US, true);
        script
    }

    fn frame_bytes(humidity_raw: u16, temperature_raw: u16) -> [u8; DATA_BYTES] {
        let [hh, hl] = humidity_raw.to_be_bytes();
        let [th, tl] = temperature_raw.to_be_bytes();
        let checksum = hh.wrapping_add(hl).wrapping_add(th).wrapping_add(tl);
        [hh, hl, th, tl, checksum]
    }

    /// Declares the fixture locals and a ready `Dht22` named `$dht`.
    macro_rules! fixture {
        ($script:expr => $clock:ident, $register:ident, $temperature_progress:ident,
         $humidity_progress:ident, $buzzer:ident, $dht:ident) => {
            let $clock = MockClock::new();
            let script = $script;
            let $register = RefCell::new(MockLedRegister::new());
            let $temperature_progress =
                RefCell::new(LedProgressTask::new(LedGroup::new(&$register, 0, 4)));
            let $humidity_progress =
                RefCell::new(LedProgressTask::new(LedGroup::new(&$register, 4, 3)));
            let $buzzer = RefCell::new(MockAlert::default());
            let mut $dht = Dht22::new(
                SimPin::new(&script, &$clock),
                MockDelay::new(&$clock),
                $clock.time(),
                LedGroup::new(&$register, 0, 4),
                &$temperature_progress,
                LedGroup::new(&$register, 4, 3),
                &$humidity_progress,
                &$buzzer,
            );
            let _ = (&$register, &$temperature_progress, &$humidity_progress, &$buzzer);
        };
    }

    /// Drives one full start-signal + read cycle.
    fn run_cycle(dht: &mut dyn Task, clock: &MockClock) {
        assert_eq!(
            dht.execute(clock.time().now_ms()),
            Reschedule::After(START_SIGNAL_MS)
        );
        clock.advance_ms(START_SIGNAL_MS);
        assert_eq!(
            dht.execute(clock.time().now_ms()),
            Reschedule::After(READ_PERIOD_MS)
        );
    }

    #[test]
    fn decodes_a_valid_frame() {
        // 55.3 %RH, 24.6 °C: both in the comfort bands.
        fixture!(frame_script(START_SIGNAL_MS * 1_000, frame_bytes(553, 246))
            => clock, register, temperature_progress, humidity_progress, buzzer, dht);

        run_cycle(&mut dht, &clock);

        assert_eq!(dht.temperature(), Some(24));
        assert_eq!(dht.humidity(), Some(55));
        assert_eq!(dht.read_errors(), 0);
        assert_eq!(buzzer.borrow().alerts, 0);

        // Comfort positions: temperature LED 2 (bit 1), humidity LED 2
        // (bit 5).
        assert_eq!(register.borrow().value(), 0b0010_0010);
        assert!(temperature_progress.borrow().is_paused());
        assert!(humidity_progress.borrow().is_paused());
    }

    #[test]
    fn decodes_a_negative_temperature() {
        // -10.5 °C with the sign carried in the top bit.
        fixture!(frame_script(START_SIGNAL_MS * 1_000, frame_bytes(400, 0x8000 | 105))
            => clock, register, temperature_progress, humidity_progress, buzzer, dht);

        run_cycle(&mut dht, &clock);

        assert_eq!(dht.temperature(), Some(-10));
        assert_eq!(dht.humidity(), Some(40));
    }

    #[test]
    fn uncomfortable_reading_alerts_and_marks_the_band() {
        // 20.2 %RH (dry), 30.1 °C (hot): two alerts, outer band LEDs.
        fixture!(frame_script(START_SIGNAL_MS * 1_000, frame_bytes(202, 301))
            => clock, register, temperature_progress, humidity_progress, buzzer, dht);

        run_cycle(&mut dht, &clock);

        assert_eq!(dht.temperature(), Some(30));
        assert_eq!(dht.humidity(), Some(20));
        assert_eq!(buzzer.borrow().alerts, 2);

        // Hot is temperature LED 4 (bit 3); dry is humidity LED 1 (bit 4).
        assert_eq!(register.borrow().value(), 0b0001_1000);
    }

    #[test]
    fn checksum_mismatch_is_an_error_not_a_reading() {
        let mut bytes = frame_bytes(553, 246);
        bytes[1] ^= 0x04; // corrupt a data byte, keep the old checksum
        fixture!(frame_script(START_SIGNAL_MS * 1_000, bytes)
            => clock, register, temperature_progress, humidity_progress, buzzer, dht);

        run_cycle(&mut dht, &clock);

        assert_eq!(dht.temperature(), None);
        assert_eq!(dht.humidity(), None);
        assert_eq!(dht.read_errors(), 1);
        assert_eq!(buzzer.borrow().alerts, 0);
        assert!(!temperature_progress.borrow().is_paused());
        assert!(!humidity_progress.borrow().is_paused());
    }

    #[test]
    fn any_single_bit_corruption_fails_the_checksum() {
        let bytes = frame_bytes(553, 246);

        for bit_id in 0..DATA_BITS {
            let mut corrupted = bytes;
            corrupted[bit_id / 8] ^= 1 << (7 - bit_id % 8);

            fixture!(frame_script(START_SIGNAL_MS * 1_000, corrupted)
                => clock, register, temperature_progress, humidity_progress, buzzer, dht);
            run_cycle(&mut dht, &clock);

            assert_eq!(dht.temperature(), None, "bit {bit_id} slipped through");
            assert_eq!(dht.read_errors(), 1);
        }
    }

    #[test]
    fn silent_device_times_out() {
        // The line never leaves idle high: no ack, no bits.
        fixture!(LineScript::new(true)
            => clock, register, temperature_progress, humidity_progress, buzzer, dht);

        run_cycle(&mut dht, &clock);

        assert_eq!(dht.temperature(), None);
        assert_eq!(dht.read_errors(), 1);
    }

    #[test]
    fn pause_halts_both_progress_animations() {
        fixture!(LineScript::new(true)
            => clock, register, temperature_progress, humidity_progress, buzzer, dht);

        Task::pause(&mut dht);
        assert!(dht.is_paused());
        assert!(temperature_progress.borrow().is_paused());
        assert!(humidity_progress.borrow().is_paused());

        Task::resume(&mut dht);
        assert!(!dht.is_paused());
    }
}
