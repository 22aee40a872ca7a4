//! Node-to-receiver end-to-end flow over an in-memory radio link.

use core::cell::RefCell;

use heapless::{String, Vec};

use clima_core::message::SensorMessage;
use clima_core::mock::{MockClock, MockRadio, MockRadioState, RecordingSink};
use clima_core::receiver::ReceiverPipeline;
use clima_core::scheduler::Task;
use clima_core::transmitter::{ClimateSource, Transmitter};

struct FixedReadings;

impl ClimateSource for FixedReadings {
    fn temperature(&self) -> Option<i8> {
        Some(22)
    }

    fn humidity(&self) -> Option<u8> {
        Some(45)
    }
}

#[test]
fn transmitted_reading_arrives_as_a_hex_line() {
    let link = RefCell::new(MockRadioState::default());
    let clock = MockClock::new();
    let lines: RefCell<Vec<String<32>, 8>> = RefCell::new(Vec::new());

    // Node side: encode and send the current readings.
    let source = RefCell::new(FixedReadings);
    let mut transmitter = Transmitter::new(3, &source, MockRadio::new(&link));
    transmitter.record_co2(800);
    transmitter.record_pressure(1_013);
    transmitter.execute(0);

    // The wire form carries co2 in wire order.
    let sent = link.borrow().sent[0].clone();
    assert_eq!(sent.as_slice(), [0x33, 0xCF, 0x6A, 0x0D, 0x48, 0xFD]);

    // The link delivers the sent frame to the receiver untouched.
    link.borrow_mut().queue_incoming(&sent);

    let mut pipeline = ReceiverPipeline::new(
        MockRadio::new(&link),
        clock.time(),
        RecordingSink::new(&lines),
    );
    pipeline.poll();

    // The forwarded line has co2 fixed back to host order.
    assert_eq!(lines.borrow().len(), 1);
    assert_eq!(lines.borrow()[0].as_str(), "> 33CF6A814CFD");
    assert_eq!(pipeline.stats().rx_good, 1);
}

#[test]
fn truncated_frame_is_dropped_end_to_end() {
    let link = RefCell::new(MockRadioState::default());
    let clock = MockClock::new();
    let lines: RefCell<Vec<String<32>, 8>> = RefCell::new(Vec::new());

    let frame = SensorMessage::new(3, 22, 45, 800, 1_013).encode();
    link.borrow_mut().queue_incoming(&frame[..5]);

    let mut pipeline = ReceiverPipeline::new(
        MockRadio::new(&link),
        clock.time(),
        RecordingSink::new(&lines),
    );
    pipeline.poll();

    assert!(lines.borrow().is_empty());
    assert_eq!(pipeline.stats().rx_bad, 1);
    assert_eq!(pipeline.stats().rx_good, 0);
}
