//! Firmware library for the gb7 board (ATmega328P)
//!
//! Everything except `hal` is plain `no_std` Rust and runs in host tests.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod drivers;
pub mod error;
pub mod logger;
pub mod rtos;
pub mod testing;
pub mod time;

#[cfg(target_arch = "avr")]
pub mod hal;

pub use error::Error;
