//! Receiver pipeline: validate, fix byte order, hex-forward.
//!
//! Accepted frames go to the host as one line each; while the link is
//! quiet, periodic liveness and statistics lines go to the log instead. The
//! payload carries no integrity check: corruption in transit passes through
//! undetected, a known property of the protocol.

use heapless::String;
use log::{info, warn};

use crate::message::{self, HEX_SIZE, SensorMessage, WIRE_SIZE};
use crate::traits::{RadioTransport, ReportSink, TimeSource};

/// Minimum quiet time before a liveness line, ms.
const HEARTBEAT_INTERVAL_MS: u64 = 60_000;

/// Prefix of every forwarded frame line.
const FORWARD_PREFIX: &str = "> ";

/// One byte beyond the wire size, so oversize frames are detected rather
/// than silently truncated to a valid length.
const RECEIVE_BUF_SIZE: usize = WIRE_SIZE + 1;

/// Rolling receive counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverStats {
    pub rx_good: u32,
    pub rx_bad: u32,
}

/// Polls the radio and forwards decoded frames to the report sink.
pub struct ReceiverPipeline<R, T, S>
where
    R: RadioTransport,
    T: TimeSource,
    S: ReportSink,
{
    radio: R,
    time: T,
    sink: S,
    stats: ReceiverStats,
    last_heartbeat_ms: u64,
    last_stats_ms: u64,
}

impl<R, T, S> ReceiverPipeline<R, T, S>
where
    R: RadioTransport,
    T: TimeSource,
    S: ReportSink,
{
    pub fn new(radio: R, time: T, sink: S) -> Self {
        let now_ms = time.now_ms();
        Self {
            radio,
            time,
            sink,
            stats: ReceiverStats::default(),
            last_heartbeat_ms: now_ms,
            last_stats_ms: now_ms,
        }
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// One bounded iteration of the receive loop.
    pub fn poll(&mut self) {
        let mut buf = [0u8; RECEIVE_BUF_SIZE];
        match self.radio.try_receive(&mut buf) {
            Ok(Some(size)) => self.on_frame(&buf[..size]),
            Ok(None) => self.on_idle(),
            Err(error) => {
                self.stats.rx_bad += 1;
                warn!("Radio receive failed: {}.", error);
            }
        }
    }

    fn on_idle(&mut self) {
        let now_ms = self.time.now_ms();
        let heartbeat_due = now_ms - self.last_heartbeat_ms >= HEARTBEAT_INTERVAL_MS;

        if heartbeat_due {
            info!("I'm alive but there are no messages from sensors.");
            self.last_heartbeat_ms = now_ms;
        }

        if heartbeat_due || now_ms - self.last_stats_ms >= HEARTBEAT_INTERVAL_MS {
            info!(
                "Received messages statistics: {} good, {} bad.",
                self.stats.rx_good, self.stats.rx_bad
            );
            self.last_stats_ms = now_ms;
        }
    }

    fn on_frame(&mut self, frame: &[u8]) {
        self.last_heartbeat_ms = self.time.now_ms();

        let Ok(mut frame) = <[u8; WIRE_SIZE]>::try_from(frame) else {
            self.stats.rx_bad += 1;
            warn!("Got a message with invalid size: {} bytes.", frame.len());
            return;
        };
        self.stats.rx_good += 1;

        let message = SensorMessage::from_wire(&frame);
        info!("Got a message from #{} sensor.", message.sensor_id);

        // The co2 field alone travels in wire order; forward everything in
        // host order.
        message::swap_co2_to_host(&mut frame);

        let mut line: String<{ FORWARD_PREFIX.len() + HEX_SIZE }> = String::new();
        // capacity covers the prefix plus two characters per byte exactly
        let _ = line.push_str(FORWARD_PREFIX);
        let _ = line.push_str(message::hex_encode(&frame).as_str());
        self.sink.forward(&line);
    }
}
