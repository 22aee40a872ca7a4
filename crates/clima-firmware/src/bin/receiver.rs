//! Radio receiver: decodes sensor frames and forwards them to the host.

#![no_std]
#![no_main]

use esp_hal::clock::CpuClock;
use esp_hal::main;
use esp_hal::uart::{self, Uart};
use log::info;

use clima_core::receiver::ReceiverPipeline;
use clima_firmware::platform::{EspClock, RttSink};
use clima_firmware::radio::UartRadio;

/// Radio modem symbol rate, baud.
const RADIO_BAUD_RATE: u32 = 1_200;

esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

#[main]
fn main() -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let radio_uart = Uart::new(
        peripherals.UART1,
        uart::Config::default().with_baudrate(RADIO_BAUD_RATE),
    )
    .expect("Failed to initialize the receiver")
    .with_rx(peripherals.GPIO18)
    .with_tx(peripherals.GPIO17);

    let mut pipeline = ReceiverPipeline::new(
        UartRadio::new(radio_uart, EspClock),
        EspClock,
        RttSink,
    );

    info!("Listening to messages from sensors...");
    loop {
        pipeline.poll();
    }
}
