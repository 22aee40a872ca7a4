//! Wireless climate sensor node.
//!
//! Samples a DHT22 over its single-wire bus, shows the comfort bands on a
//! shift-register LED bank, dims the bank to ambient light, sounds a buzzer
//! on uncomfortable readings and radios the readings out.

#![no_std]
#![no_main]

use core::cell::RefCell;

use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{DriveMode, Flex, Level, Output, OutputConfig, Pull};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed, channel, timer};
use esp_hal::main;
use esp_hal::time::Rate;
use esp_hal::uart::{self, Uart};
use heapless::Vec;
use log::info;

use clima_core::brightness::BrightnessRegulator;
use clima_core::buzzer::Buzzer;
use clima_core::dht22::Dht22;
use clima_core::indication::{LedGroup, LedProgressTask, ShiftRegisterLeds};
use clima_core::scheduler::TaskScheduler;
use clima_core::transmitter::Transmitter;
use clima_firmware::platform::{EspClock, LedSupplyPwm, LightSensor};
use clima_firmware::radio::UartRadio;

/// Identifier carried in every outgoing message.
const SENSOR_ID: u8 = 1;

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

    info!("Climate sensor node starting.");

    // Shift-register LED bank on data/clock/latch.
    let leds = RefCell::new(ShiftRegisterLeds::new(
        Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default()),
    ));

    let temperature_progress = RefCell::new(LedProgressTask::new(LedGroup::new(&leds, 0, 4)));
    let humidity_progress = RefCell::new(LedProgressTask::new(LedGroup::new(&leds, 4, 3)));

    let buzzer = RefCell::new(Buzzer::new(Output::new(
        peripherals.GPIO8,
        Level::Low,
        OutputConfig::default(),
    )));

    // The sensor bus idles high through its pull-up; both sides only ever
    // drive it low.
    let mut sensor_pin = Flex::new(peripherals.GPIO7);
    sensor_pin.apply_output_config(
        &OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up),
    );
    sensor_pin.set_output_enable(true);
    sensor_pin.set_input_enable(true);
    sensor_pin.set_high();

    let dht = RefCell::new(Dht22::new(
        sensor_pin,
        Delay::new(),
        EspClock,
        LedGroup::new(&leds, 0, 4),
        &temperature_progress,
        LedGroup::new(&leds, 4, 3),
        &humidity_progress,
        &buzzer,
    ));

    // Ambient light on ADC1.
    let mut adc_config = AdcConfig::new();
    let light_pin = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);

    // LED supply PWM through LEDC, 8-bit duty.
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let mut pwm_timer = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    pwm_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty8Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(1),
        })
        .expect("Failed to configure the PWM timer");
    let mut pwm_channel = ledc.channel(channel::Number::Channel0, peripherals.GPIO9);
    pwm_channel
        .configure(channel::config::Config {
            timer: &pwm_timer,
            duty_pct: 1,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .expect("Failed to configure the PWM channel");

    let mut pwm_outputs = Vec::new();
    assert!(pwm_outputs.push(LedSupplyPwm::new(pwm_channel)).is_ok());
    let brightness = RefCell::new(BrightnessRegulator::new(
        LightSensor::new(adc, light_pin),
        pwm_outputs,
    ));

    // Radio modem on UART1.
    let radio_uart = Uart::new(
        peripherals.UART1,
        uart::Config::default().with_baudrate(RADIO_BAUD_RATE),
    )
    .expect("Failed to initialize the radio UART")
    .with_tx(peripherals.GPIO17)
    .with_rx(peripherals.GPIO18);
    let transmitter = RefCell::new(Transmitter::new(
        SENSOR_ID,
        &dht,
        UartRadio::new(radio_uart, EspClock),
    ));

    let mut scheduler = TaskScheduler::new(EspClock);
    scheduler
        .add_task(&dht)
        .expect("Failed to schedule the sensor task");
    scheduler
        .add_task(&temperature_progress)
        .expect("Failed to schedule the temperature progress task");
    scheduler
        .add_task(&humidity_progress)
        .expect("Failed to schedule the humidity progress task");
    scheduler
        .add_task(&buzzer)
        .expect("Failed to schedule the buzzer task");
    scheduler
        .add_task(&brightness)
        .expect("Failed to schedule the brightness regulator");
    scheduler
        .add_task(&transmitter)
        .expect("Failed to schedule the transmitter");

    info!("Entering the task loop.");
    loop {
        scheduler.run_pending();
    }
}
