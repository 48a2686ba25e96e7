#![no_std]

// Shared logic for the low-energy voltage monitor.
//
// The sampling pipeline is described against hardware traits so the same
// state machine drives the STM32 firmware, the host emulator, and the
// simulated board used by the tests.

pub mod average;
pub mod buffer;
pub mod config;
pub mod console;
pub mod hal;
pub mod monitor;
pub mod power;
pub mod sim;
pub mod telemetry;
