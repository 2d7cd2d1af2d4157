//! A USB to I2C bridge, speaking the i2c-tiny-usb protocol
//!
//! `i2c-tiny-usbd` turns a microcontroller with a USB device port and an
//! I2C master into an I2C adapter for a host computer. The host issues
//! vendor-specific control requests on endpoint 0; the bridge turns them
//! into I2C bus transactions, streaming each data phase byte by byte between
//! the control pipe and the bus. Host drivers written for i2c-tiny-usb, like
//! Linux's `i2c-tiny-usb`, work unmodified.
//!
//! The bridge is hardware agnostic. To use it, implement
//!
//! - [`I2cMaster`] for your chip's I2C peripheral, and either
//! - [`ControlEndpoint`] for your chip's endpoint 0, driving the [`Bridge`]
//!   from your main loop, or
//! - a [`usb-device`] bus, and use the [`class`] adapter.
//!
//! A logical I2C transaction may span several control requests. The
//! [`Bridge`] remembers how the latest addressing attempt went (the
//! [`BusStatus`]) so that later requests of a failed transaction leave the
//! bus alone, while still completing on the USB side.
//!
//! [`usb-device`]: https://crates.io/crates/usb-device

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod bridge;
pub mod class;
pub mod command;
pub mod config;
pub mod control;
pub mod i2c;
pub mod sequencer;
pub mod speed;
pub mod stream;

#[cfg(test)]
mod sim;

pub use bridge::{Bridge, Response};
pub use command::{Capabilities, Command};
pub use config::Config;
pub use control::{ControlEndpoint, LinkState};
pub use i2c::{Ack, Direction, I2cMaster};
pub use sequencer::{BusStatus, Sequencer};
pub use speed::{BusSpeedConfig, Prescaler};
pub use stream::Abort;
