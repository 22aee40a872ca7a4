//! Audible alerting.

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;

use crate::scheduler::{Reschedule, Task};
use crate::traits::infallible;

/// Expiry check period, ms.
const TICK_PERIOD_MS: u64 = 50;

/// Length of the standard alert tone, ms.
const ALERT_DURATION_MS: u64 = 1_000;

/// Something able to raise an audible alert.
pub trait AlertSignal {
    fn alert(&mut self, now_ms: u64);
}

/// Active buzzer on a digital pin. Sounds for a bounded duration; the
/// periodic task silences it once the duration elapses.
pub struct Buzzer<P: OutputPin<Error = Infallible>> {
    pin: P,
    off_at_ms: Option<u64>,
}

impl<P: OutputPin<Error = Infallible>> Buzzer<P> {
    pub fn new(mut pin: P) -> Self {
        infallible(pin.set_low());
        Self {
            pin,
            off_at_ms: None,
        }
    }

    /// Sounds the buzzer for `duration_ms`; an ongoing beep is extended.
    pub fn beep(&mut self, now_ms: u64, duration_ms: u64) {
        infallible(self.pin.set_high());
        self.off_at_ms = Some(now_ms + duration_ms);
    }

    pub fn is_active(&self) -> bool {
        self.off_at_ms.is_some()
    }
}

impl<P: OutputPin<Error = Infallible>> AlertSignal for Buzzer<P> {
    fn alert(&mut self, now_ms: u64) {
        self.beep(now_ms, ALERT_DURATION_MS);
    }
}

impl<P: OutputPin<Error = Infallible>> Task for Buzzer<P> {
    fn execute(&mut self, now_ms: u64) -> Reschedule {
        if let Some(off_at_ms) = self.off_at_ms {
            if now_ms >= off_at_ms {
                infallible(self.pin.set_low());
                self.off_at_ms = None;
            }
        }
        Reschedule::After(TICK_PERIOD_MS)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::mock::RecordingPin;

    #[test]
    fn beep_raises_the_pin_until_the_duration_elapses() {
        let level = Cell::new(false);
        let mut buzzer = Buzzer::new(RecordingPin::new(&level));
        assert!(!level.get());

        buzzer.beep(0, 200);
        assert!(level.get());
        assert!(buzzer.is_active());

        buzzer.execute(150);
        assert!(level.get());

        buzzer.execute(200);
        assert!(!level.get());
        assert!(!buzzer.is_active());
    }

    #[test]
    fn alert_extends_an_ongoing_beep() {
        let level = Cell::new(false);
        let mut buzzer = Buzzer::new(RecordingPin::new(&level));

        buzzer.alert(0);
        buzzer.alert(500);

        buzzer.execute(ALERT_DURATION_MS);
        assert!(level.get());

        buzzer.execute(500 + ALERT_DURATION_MS);
        assert!(!level.get());
    }
}
