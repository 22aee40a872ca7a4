//! Test doubles for the platform seams.
//!
//! Always compiled so downstream crates can reuse them; everything here is
//! `no_std`. The clock is shared: delays advance it instead of sleeping, so
//! bounded busy-waits against scripted pin timelines run deterministically.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use heapless::{String, Vec};

use crate::buzzer::AlertSignal;
use crate::indication::{LedRegister, LedsValue};
use crate::traits::{AnalogInput, PwmOutput, RadioError, RadioTransport, ReportSink, TimeSource};

/// Controllable clock shared by every handle created from it.
#[derive(Default)]
pub struct MockClock {
    now_us: Cell<u64>,
}

impl MockClock {
    pub const fn new() -> Self {
        Self {
            now_us: Cell::new(0),
        }
    }

    pub fn set_us(&self, us: u64) {
        self.now_us.set(us);
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1_000);
    }

    /// A [`TimeSource`] handle onto this clock.
    pub fn time(&self) -> MockTime<'_> {
        MockTime { clock: self }
    }
}

#[derive(Clone, Copy)]
pub struct MockTime<'a> {
    clock: &'a MockClock,
}

impl TimeSource for MockTime<'_> {
    fn now_ms(&self) -> u64 {
        self.clock.now_us.get() / 1_000
    }

    fn now_us(&self) -> u64 {
        self.clock.now_us.get()
    }
}

/// Delay provider that advances the shared clock instead of sleeping.
pub struct MockDelay<'a> {
    clock: &'a MockClock,
}

impl<'a> MockDelay<'a> {
    pub fn new(clock: &'a MockClock) -> Self {
        Self { clock }
    }
}

impl DelayNs for MockDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_us(u64::from(ns.div_ceil(1_000)));
    }
}

/// Logic-level timeline for a simulated bus line.
pub struct LineScript {
    initial: bool,
    transitions: Vec<(u64, bool), 128>,
}

impl LineScript {
    pub fn new(initial: bool) -> Self {
        Self {
            initial,
            transitions: Vec::new(),
        }
    }

    /// Appends a level change; times must be non-decreasing.
    pub fn set(&mut self, at_us: u64, level: bool) {
        if let Some(&(last_us, _)) = self.transitions.last() {
            debug_assert!(at_us >= last_us);
        }
        // capacity is a test-sizing concern
        let _ = self.transitions.push((at_us, level));
    }

    pub fn level_at(&self, at_us: u64) -> bool {
        let mut level = self.initial;
        for &(us, scripted) in self.transitions.iter() {
            if us > at_us {
                break;
            }
            level = scripted;
        }
        level
    }
}

/// Pin bound to a [`LineScript`] and a [`MockClock`]: reads reflect the
/// scripted level at the current time, writes are recorded.
pub struct SimPin<'a> {
    script: &'a LineScript,
    clock: &'a MockClock,
    last_driven: Option<bool>,
}

impl<'a> SimPin<'a> {
    pub fn new(script: &'a LineScript, clock: &'a MockClock) -> Self {
        Self {
            script,
            clock,
            last_driven: None,
        }
    }

    pub fn last_driven(&self) -> Option<bool> {
        self.last_driven
    }
}

impl ErrorType for SimPin<'_> {
    type Error = Infallible;
}

impl InputPin for SimPin<'_> {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.script.level_at(self.clock.now_us.get()))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.script.level_at(self.clock.now_us.get()))
    }
}

impl OutputPin for SimPin<'_> {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.last_driven = Some(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.last_driven = Some(true);
        Ok(())
    }
}

/// Output pin mirroring its level into a shared cell.
pub struct RecordingPin<'a> {
    level: &'a Cell<bool>,
}

impl<'a> RecordingPin<'a> {
    pub fn new(level: &'a Cell<bool>) -> Self {
        Self { level }
    }
}

impl ErrorType for RecordingPin<'_> {
    type Error = Infallible;
}

impl OutputPin for RecordingPin<'_> {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.level.set(true);
        Ok(())
    }
}

/// Analog input replaying a scripted sequence, holding its last value.
pub struct MockAnalog {
    readings: Vec<u16, 64>,
    next: usize,
}

impl MockAnalog {
    pub fn new(readings: &[u16]) -> Self {
        let mut buffered = Vec::new();
        // excess samples beyond capacity are a test-sizing concern
        let _ = buffered.extend_from_slice(readings);
        Self {
            readings: buffered,
            next: 0,
        }
    }
}

impl AnalogInput for MockAnalog {
    fn read(&mut self) -> u16 {
        let reading = self
            .readings
            .get(self.next)
            .or_else(|| self.readings.last())
            .copied()
            .unwrap_or(0);
        if self.next < self.readings.len() {
            self.next += 1;
        }
        reading
    }
}

/// PWM output appending every write to a shared log.
pub struct MockPwm<'a> {
    writes: &'a RefCell<Vec<u8, 32>>,
}

impl<'a> MockPwm<'a> {
    pub fn new(writes: &'a RefCell<Vec<u8, 32>>) -> Self {
        Self { writes }
    }
}

impl PwmOutput for MockPwm<'_> {
    fn set_duty(&mut self, duty: u8) {
        let _ = self.writes.borrow_mut().push(duty);
    }
}

/// In-memory LED register tracking the held value and write count.
#[derive(Default)]
pub struct MockLedRegister {
    value: LedsValue,
    writes: u32,
}

impl MockLedRegister {
    pub const fn new() -> Self {
        Self {
            value: 0,
            writes: 0,
        }
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl LedRegister for MockLedRegister {
    fn set(&mut self, value: LedsValue) {
        self.value = value;
        self.writes += 1;
    }

    fn update(&mut self, value: LedsValue, mask: LedsValue) {
        let value_without_group = self.value & !mask;
        self.set(value_without_group | value);
    }

    fn value(&self) -> LedsValue {
        self.value
    }
}

/// Shared state behind [`MockRadio`] handles.
#[derive(Default)]
pub struct MockRadioState {
    pub sent: Vec<Vec<u8, 16>, 8>,
    pub incoming: Vec<Vec<u8, 16>, 8>,
    pub fail_send: bool,
    pub fail_receive: bool,
}

impl MockRadioState {
    pub fn queue_incoming(&mut self, frame: &[u8]) {
        let mut buffered = Vec::new();
        let _ = buffered.extend_from_slice(frame);
        let _ = self.incoming.push(buffered);
    }
}

/// Radio transport over a shared in-memory state.
pub struct MockRadio<'a> {
    state: &'a RefCell<MockRadioState>,
}

impl<'a> MockRadio<'a> {
    pub fn new(state: &'a RefCell<MockRadioState>) -> Self {
        Self { state }
    }
}

impl RadioTransport for MockRadio<'_> {
    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        let mut state = self.state.borrow_mut();
        if state.fail_send {
            return Err(RadioError::SendFailed);
        }
        let mut frame = Vec::new();
        let _ = frame.extend_from_slice(payload);
        let _ = state.sent.push(frame);
        Ok(())
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>, RadioError> {
        let mut state = self.state.borrow_mut();
        if state.fail_receive {
            return Err(RadioError::ReceiveFailed);
        }
        if state.incoming.is_empty() {
            return Ok(None);
        }
        let frame = state.incoming.remove(0);
        let size = frame.len().min(buf.len());
        buf[..size].copy_from_slice(&frame[..size]);
        Ok(Some(size))
    }
}

/// Report sink appending forwarded lines to a shared log.
pub struct RecordingSink<'a> {
    lines: &'a RefCell<Vec<String<32>, 8>>,
}

impl<'a> RecordingSink<'a> {
    pub fn new(lines: &'a RefCell<Vec<String<32>, 8>>) -> Self {
        Self { lines }
    }
}

impl ReportSink for RecordingSink<'_> {
    fn forward(&mut self, line: &str) {
        let mut captured = String::new();
        let _ = captured.push_str(line);
        let _ = self.lines.borrow_mut().push(captured);
    }
}

/// Alert signal counting invocations.
#[derive(Default)]
pub struct MockAlert {
    pub alerts: u32,
}

impl AlertSignal for MockAlert {
    fn alert(&mut self, _now_ms: u64) {
        self.alerts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_advances_the_shared_clock() {
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);

        delay.delay_us(40);
        delay.delay_ms(2);
        assert_eq!(clock.time().now_us(), 2_040);
        assert_eq!(clock.time().now_ms(), 2);
    }

    #[test]
    fn line_script_replays_levels_by_time() {
        let mut script = LineScript::new(true);
        script.set(100, false);
        script.set(180, true);

        assert!(script.level_at(0));
        assert!(script.level_at(99));
        assert!(!script.level_at(100));
        assert!(!script.level_at(179));
        assert!(script.level_at(180));
        assert!(script.level_at(10_000));
    }

    #[test]
    fn elapsed_since_saturates() {
        let clock = MockClock::new();
        clock.set_us(1_000);
        assert_eq!(clock.time().elapsed_us_since(5_000), 0);
        assert_eq!(clock.time().elapsed_us_since(400), 600);
    }
}
