//! Hardware-independent core library for clima-rs
//!
//! This crate contains all platform-agnostic logic for the clima wireless
//! climate sensor pair: the sensor-message wire codec, the DHT22
//! acquisition state machine and comfort classification, shift-register LED
//! indication with adaptive brightness, the cooperative task scheduler, and
//! the receiver's validate/decode/forward pipeline.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3)
//! and desktop hosts (for the test suite).

#![no_std]

pub mod brightness;
pub mod buzzer;
pub mod comfort;
pub mod dht22;
pub mod indication;
pub mod message;
pub mod mock;
pub mod receiver;
pub mod scheduler;
pub mod traits;
pub mod transmitter;
