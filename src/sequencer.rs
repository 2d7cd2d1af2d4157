//! I2C transaction sequencing
//!
//! The [`Sequencer`] opens and closes bus transactions, and remembers how
//! the most recent addressing attempt went. That outcome, the [`BusStatus`],
//! is what the host reads back with a status request, and what decides
//! whether later requests of the same transaction touch the bus.

use embedded_hal::delay::DelayNs;

use crate::i2c::{Ack, Direction, I2cMaster};

/// Interval between attempts to capture the bus, in microseconds
const POLL_INTERVAL_US: u32 = 10;

/// Outcome of the most recent addressing attempt
///
/// The discriminant is the status byte reported to the host.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BusStatus {
    /// No transaction was attempted yet
    #[default]
    Idle = 0,
    /// The target acknowledged its address
    AddressAcked = 1,
    /// The target didn't respond, or the bus couldn't be captured
    AddressNacked = 2,
}

impl BusStatus {
    /// Returns the status byte
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Owner of the [`BusStatus`]
#[derive(Debug, Default)]
pub struct Sequencer {
    status: BusStatus,
}

impl Sequencer {
    /// A sequencer that hasn't attempted any transaction
    pub const fn new() -> Self {
        Sequencer {
            status: BusStatus::Idle,
        }
    }

    /// Returns the outcome of the most recent addressing attempt
    pub fn status(&self) -> BusStatus {
        self.status
    }

    /// Indicates if data phases must leave the bus alone
    pub fn skip_bus(&self) -> bool {
        self.status == BusStatus::AddressNacked
    }

    /// Issue a start condition, and address the target
    ///
    /// The master is polled every few microseconds while the bus is busy.
    /// If the bus isn't captured within `timeout_ms`, or the master reports
    /// an error, the attempt counts as not acknowledged. A stop condition
    /// follows a NACKed address only; without a start there's nothing to
    /// release.
    pub fn start_transaction<M: I2cMaster, D: DelayNs>(
        &mut self,
        master: &mut M,
        delay: &mut D,
        address: u8,
        direction: Direction,
        timeout_ms: u32,
    ) -> BusStatus {
        let address = address & 0x7F;
        let budget_us = timeout_ms.saturating_mul(1000);
        let mut waited_us = 0;

        self.status = loop {
            match master.start(address, direction) {
                Ok(Ack::Ack) => break BusStatus::AddressAcked,
                Ok(Ack::Nack) => {
                    if master.stop().is_err() {
                        warn!("I2C {=u8:#x}: stop after NACK failed", address);
                    }
                    break BusStatus::AddressNacked;
                }
                Err(nb::Error::WouldBlock) if waited_us < budget_us => {
                    delay.delay_us(POLL_INTERVAL_US);
                    waited_us += POLL_INTERVAL_US;
                }
                Err(nb::Error::WouldBlock) => {
                    warn!("I2C {=u8:#x}: bus capture timed out", address);
                    break BusStatus::AddressNacked;
                }
                Err(nb::Error::Other(_)) => {
                    warn!("I2C {=u8:#x}: start failed", address);
                    break BusStatus::AddressNacked;
                }
            }
        };
        debug!("I2C {=u8:#x} {} -> {}", address, direction, self.status);
        self.status
    }

    /// Issue a stop condition, ending the bus transaction
    pub fn stop_transaction<M: I2cMaster>(&mut self, master: &mut M) {
        if master.stop().is_err() {
            warn!("I2C stop failed");
        }
    }
}
