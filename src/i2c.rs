//! I2C master abstraction
//!
//! The bridge drives the I2C bus one byte at a time, and a logical I2C
//! transaction may span several USB control requests. That rules out
//! transaction-shaped traits, like `embedded_hal::i2c::I2c`. Instead, a
//! chip-specific HAL exposes the primitive bus cycles through [`I2cMaster`].

use crate::speed::BusSpeedConfig;

/// Data direction, sent as the R/W bit after the 7-bit address
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// Acknowledgement returned by the addressed target
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    Ack,
    Nack,
}

/// Byte-level I2C master
///
/// Implementations own the I2C peripheral. All calls come from the same
/// execution context.
pub trait I2cMaster {
    /// Error reported by the peripheral (bus error, lost arbitration, ...)
    type Error: core::fmt::Debug;

    /// Disable the peripheral, releasing the bus lines.
    fn disable(&mut self);

    /// Program the SCL clock, and enable the peripheral.
    ///
    /// The bridge only calls this after [`disable()`](I2cMaster::disable).
    fn configure_clock(&mut self, config: BusSpeedConfig);

    /// Issue a (repeated) start condition, then address the target.
    ///
    /// Returns `WouldBlock` while the bus can't be captured yet; the caller
    /// retries until its timeout budget runs out.
    fn start(&mut self, address: u8, direction: Direction) -> nb::Result<Ack, Self::Error>;

    /// Issue a stop condition.
    fn stop(&mut self) -> Result<(), Self::Error>;

    /// Clock one byte out to the target, blocking until the master can
    /// accept it.
    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error>;

    /// Clock one byte in from the target, answering with NACK when `nack`
    /// is set, or ACK otherwise.
    fn read_byte(&mut self, nack: bool) -> Result<u8, Self::Error>;
}
