//! ESP32-S3 firmware-specific modules for clima-rs
//!
//! This crate contains the hardware wiring that cannot compile on desktop
//! targets: GPIO and ADC setup, LEDC PWM, the UART-attached radio modem and
//! RTT logging.

#![no_std]

pub mod platform;
pub mod radio;
