//! LED indication over daisy-chained shift registers.
//!
//! The register is the single owner of the LED bitmask; every mutation goes
//! through [`LedRegister::set`] or the masked read-modify-write
//! [`LedRegister::update`], never around them. No lock exists or is needed:
//! correctness rests on single-threaded cooperative scheduling. A design
//! that introduces real parallelism must put a mutex or actor at this seam.

use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::digital::OutputPin;

use crate::scheduler::{Reschedule, Task};
use crate::traits::infallible;

/// The full LED bitmask: two daisy-chained 8-bit shift registers.
pub type LedsValue = u16;

/// Number of addressable LEDs.
pub const MAX_LEDS: u8 = LedsValue::BITS as u8;

/// Progress animation period, ms.
const PROGRESS_PERIOD_MS: u64 = 100;

/// Mutation seam of the shared LED bitmask.
pub trait LedRegister {
    /// Serializes `value` out to the hardware and commits it as the held
    /// state.
    fn set(&mut self, value: LedsValue);

    /// Clears the `mask` bits of the held state, ORs in `value`, writes the
    /// result out.
    fn update(&mut self, value: LedsValue, mask: LedsValue);

    /// The currently held state.
    fn value(&self) -> LedsValue;
}

/// Bit-serial shift register bank on three control pins.
pub struct ShiftRegisterLeds<D, C, L> {
    data_pin: D,
    clock_pin: C,
    latch_pin: L,
    value: LedsValue,
}

impl<D, C, L> ShiftRegisterLeds<D, C, L>
where
    D: OutputPin<Error = Infallible>,
    C: OutputPin<Error = Infallible>,
    L: OutputPin<Error = Infallible>,
{
    /// Takes the three control pins and blanks the bank.
    pub fn new(data_pin: D, clock_pin: C, latch_pin: L) -> Self {
        let mut leds = Self {
            data_pin,
            clock_pin,
            latch_pin,
            value: 0,
        };
        leds.set(0);
        leds
    }

    fn shift_out(&mut self, byte: u8) {
        for bit in (0..8).rev() {
            infallible(self.data_pin.set_state((byte & (1 << bit) != 0).into()));
            infallible(self.clock_pin.set_high());
            infallible(self.clock_pin.set_low());
        }
    }
}

impl<D, C, L> LedRegister for ShiftRegisterLeds<D, C, L>
where
    D: OutputPin<Error = Infallible>,
    C: OutputPin<Error = Infallible>,
    L: OutputPin<Error = Infallible>,
{
    fn set(&mut self, value: LedsValue) {
        // Most significant register byte goes out first.
        for byte in value.to_be_bytes() {
            self.shift_out(byte);
        }

        infallible(self.latch_pin.set_high());
        infallible(self.latch_pin.set_low());

        self.value = value;
    }

    fn update(&mut self, value: LedsValue, mask: LedsValue) {
        let value_without_group = self.value & !mask;
        self.set(value_without_group | value);
    }

    fn value(&self) -> LedsValue {
        self.value
    }
}

/// A named contiguous bit range within the shared LED bitmask.
///
/// Holds a non-owning handle onto the register; all state lives there.
pub struct LedGroup<'a, R: LedRegister> {
    leds: &'a RefCell<R>,
    start_bit: u8,
    leds_num: u8,
    mask: LedsValue,
}

impl<'a, R: LedRegister> LedGroup<'a, R> {
    /// The range `[start_bit, start_bit + leds_num)` must fit the register.
    pub fn new(leds: &'a RefCell<R>, start_bit: u8, leds_num: u8) -> Self {
        assert!(start_bit + leds_num <= MAX_LEDS);

        let mut mask = 0;
        for led_id in 0..leds_num {
            mask |= (1 as LedsValue) << (start_bit + led_id);
        }

        Self {
            leds,
            start_bit,
            leds_num,
            mask,
        }
    }

    /// Lights the single LED at 1-based position `led_num` and clears the
    /// rest of the range; 0 turns the whole range off. A position beyond the
    /// group size is a programming error.
    pub fn set_led(&self, led_num: u8) {
        assert!(led_num <= self.leds_num);

        let value = if led_num > 0 {
            (1 as LedsValue) << (self.start_bit + led_num - 1)
        } else {
            0
        };

        self.leds.borrow_mut().update(value, self.mask);
    }

    pub fn leds_num(&self) -> u8 {
        self.leds_num
    }
}

/// Animates a group as a "working" cue: one position per tick, wrapping
/// through the off state.
pub struct LedProgressTask<'a, R: LedRegister> {
    group: LedGroup<'a, R>,
    cur_led_num: u8,
    paused: bool,
}

impl<'a, R: LedRegister> LedProgressTask<'a, R> {
    pub fn new(group: LedGroup<'a, R>) -> Self {
        Self {
            group,
            cur_led_num: 0,
            paused: false,
        }
    }

    pub fn position(&self) -> u8 {
        self.cur_led_num
    }
}

impl<R: LedRegister> Task for LedProgressTask<'_, R> {
    fn execute(&mut self, _now_ms: u64) -> Reschedule {
        self.cur_led_num = if self.cur_led_num >= self.group.leds_num() {
            0
        } else {
            self.cur_led_num + 1
        };
        self.group.set_led(self.cur_led_num);
        Reschedule::After(PROGRESS_PERIOD_MS)
    }

    /// Also resets the animation to the off state, so resumption restarts
    /// from the beginning.
    fn pause(&mut self) {
        self.paused = true;
        self.cur_led_num = 0;
        self.group.set_led(0);
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLedRegister;

    #[test]
    fn group_lights_exactly_one_position() {
        let leds = RefCell::new(MockLedRegister::new());
        let group = LedGroup::new(&leds, 2, 4);

        group.set_led(1);
        assert_eq!(leds.borrow().value(), 0b0000_0100);

        // A new position replaces the previous one, never accumulates.
        group.set_led(4);
        assert_eq!(leds.borrow().value(), 0b0010_0000);

        group.set_led(0);
        assert_eq!(leds.borrow().value(), 0);
    }

    #[test]
    fn groups_on_one_register_do_not_disturb_each_other() {
        let leds = RefCell::new(MockLedRegister::new());
        let temperature = LedGroup::new(&leds, 0, 4);
        let humidity = LedGroup::new(&leds, 4, 3);

        temperature.set_led(3);
        humidity.set_led(2);
        assert_eq!(leds.borrow().value(), 0b0010_0100);

        temperature.set_led(1);
        assert_eq!(leds.borrow().value(), 0b0010_0001);

        humidity.set_led(0);
        assert_eq!(leds.borrow().value(), 0b0000_0001);
    }

    #[test]
    #[should_panic]
    fn position_beyond_the_group_is_a_fault() {
        let leds = RefCell::new(MockLedRegister::new());
        let group = LedGroup::new(&leds, 0, 3);
        group.set_led(4);
    }

    #[test]
    #[should_panic]
    fn group_must_fit_the_register() {
        let leds = RefCell::new(MockLedRegister::new());
        let _ = LedGroup::new(&leds, 14, 3);
    }

    #[test]
    fn progress_cycles_through_off() {
        let leds = RefCell::new(MockLedRegister::new());
        let mut progress = LedProgressTask::new(LedGroup::new(&leds, 0, 3));

        let mut seen = [0u8; 4];
        for slot in seen.iter_mut() {
            progress.execute(0);
            *slot = progress.position();
        }
        assert_eq!(seen, [1, 2, 3, 0]);
        assert_eq!(leds.borrow().value(), 0);
    }

    #[test]
    fn pause_resets_to_off_and_resume_restarts() {
        let leds = RefCell::new(MockLedRegister::new());
        let mut progress = LedProgressTask::new(LedGroup::new(&leds, 0, 3));

        progress.execute(0);
        progress.execute(0);
        assert_eq!(progress.position(), 2);

        progress.pause();
        assert!(progress.is_paused());
        assert_eq!(progress.position(), 0);
        assert_eq!(leds.borrow().value(), 0);

        progress.resume();
        assert!(!progress.is_paused());
        progress.execute(0);
        assert_eq!(progress.position(), 1);
    }

    #[test]
    fn update_is_a_masked_read_modify_write() {
        let leds = RefCell::new(MockLedRegister::new());
        leds.borrow_mut().set(0b1111_0000);

        leds.borrow_mut().update(0b0000_0011, 0b0000_1111);
        assert_eq!(leds.borrow().value(), 0b1111_0011);
    }
}
