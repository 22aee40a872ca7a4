//! Platform seams consumed by the core logic.
//!
//! Pin-level work goes through `embedded-hal`; the traits here cover the
//! concerns it has no blocking abstraction for: elapsed time, analog input,
//! PWM output, the radio transport and the receiver's forwarding sink.

use core::convert::Infallible;

use thiserror_no_std::Error;

/// Monotonic time since boot.
///
/// Implementations are cheap handles (`Clone`) so every component can carry
/// its own.
pub trait TimeSource: Clone {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Microseconds since boot.
    fn now_us(&self) -> u64;

    /// Microseconds elapsed since `reference_us`, saturating at zero.
    fn elapsed_us_since(&self, reference_us: u64) -> u64 {
        self.now_us().saturating_sub(reference_us)
    }
}

/// A single analog input channel, 10-bit range (0..=1023).
pub trait AnalogInput {
    fn read(&mut self) -> u16;
}

/// A PWM-driven output with an 8-bit duty cycle.
pub trait PwmOutput {
    fn set_duty(&mut self, duty: u8);
}

/// Errors of the radio transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("transport failed to send")]
    SendFailed,
    #[error("transport failed to receive")]
    ReceiveFailed,
}

/// Opaque-byte radio link between the sensor node and the receiver.
pub trait RadioTransport {
    /// Transmits one frame.
    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError>;

    /// Non-blocking receive. Copies at most `buf.len()` bytes of a pending
    /// frame into `buf` and returns the copied size; `None` when no frame is
    /// pending.
    fn try_receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>, RadioError>;
}

/// Sink for the receiver's forwarded message lines.
pub trait ReportSink {
    fn forward(&mut self, line: &str);
}

/// Unwraps a result that cannot fail.
///
/// Every GPIO in this system is infallible (`Error = Infallible`), so pin
/// plumbing carries no error paths.
pub fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => match e {},
    }
}
