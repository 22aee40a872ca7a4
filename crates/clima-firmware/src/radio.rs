//! UART-attached OOK radio modem.
//!
//! The modem is transparent serial: payload bytes go out on the air as-is
//! at the radio symbol rate and received bytes arrive as-is. The receive
//! side delimits frames by an idle gap on the line, the usual convention
//! for transparent radio links.

use clima_core::traits::{RadioError, RadioTransport, TimeSource};
use embedded_io::{Read, ReadReady, Write};
use heapless::Vec;

/// Quiet time that ends a frame, ms.
const FRAME_GAP_MS: u64 = 10;

/// Longest frame the modem is expected to deliver.
const MAX_FRAME: usize = 16;

/// Radio transport over a transparent-serial modem UART.
pub struct UartRadio<U, T>
where
    U: Read + Write + ReadReady,
    T: TimeSource,
{
    uart: U,
    time: T,
    pending: Vec<u8, MAX_FRAME>,
    last_byte_ms: u64,
}

impl<U, T> UartRadio<U, T>
where
    U: Read + Write + ReadReady,
    T: TimeSource,
{
    pub fn new(uart: U, time: T) -> Self {
        Self {
            uart,
            time,
            pending: Vec::new(),
            last_byte_ms: 0,
        }
    }
}

impl<U, T> RadioTransport for UartRadio<U, T>
where
    U: Read + Write + ReadReady,
    T: TimeSource,
{
    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.uart
            .write_all(payload)
            .map_err(|_| RadioError::SendFailed)?;
        self.uart.flush().map_err(|_| RadioError::SendFailed)
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>, RadioError> {
        // Drain whatever the modem has produced so far.
        while self
            .uart
            .read_ready()
            .map_err(|_| RadioError::ReceiveFailed)?
        {
            let mut byte = [0u8; 1];
            let count = self
                .uart
                .read(&mut byte)
                .map_err(|_| RadioError::ReceiveFailed)?;
            if count == 0 {
                break;
            }
            if self.pending.push(byte[0]).is_err() {
                // Oversize garbage; restart framing at the next gap.
                self.pending.clear();
            }
            self.last_byte_ms = self.time.now_ms();
        }

        if self.pending.is_empty()
            || self.time.now_ms().saturating_sub(self.last_byte_ms) < FRAME_GAP_MS
        {
            return Ok(None);
        }

        let size = self.pending.len().min(buf.len());
        buf[..size].copy_from_slice(&self.pending[..size]);
        self.pending.clear();
        Ok(Some(size))
    }
}
